//! Rates CSV file
//!
//! ```text
//! date,EUR,USD
//! 2019-08,73.3,66.1441
//! 2019-09,,64.6
//! ```
//! An empty cell means "no rate for that period".

use crate::collect::RateSheet;
use crate::error::{RatesError, Result};
use std::path::Path;
use tracing::info;
use vacstat_common::CurrencyTable;

const DATE_COLUMN: &str = "date";

/// Write `sheet` to `path` (temp file + rename)
pub fn write_rate_sheet(sheet: &RateSheet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&temp_path)?;

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(sheet.currencies.iter().cloned());
        writer.write_record(&header)?;

        for (period, cells) in &sheet.rows {
            let mut row = vec![period.clone()];
            row.extend(cells.iter().map(|cell| cell.map(|r| r.to_string()).unwrap_or_default()));
            writer.write_record(&row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)?;

    info!(path = %path.display(), periods = sheet.rows.len(), "Rates file written");
    Ok(())
}

/// Read a rates file written by [`write_rate_sheet`]
pub fn read_rate_sheet(path: &Path) -> Result<RateSheet> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    match headers.get(0) {
        Some(first) if first.trim_start_matches('\u{feff}') == DATE_COLUMN => {}
        _ => {
            return Err(RatesError::InvalidFile(format!(
                "{}: first column must be '{}'",
                path.display(),
                DATE_COLUMN
            )))
        }
    }
    let currencies: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let period = record.get(0).unwrap_or_default().to_string();
        let mut cells = Vec::with_capacity(currencies.len());
        for (currency, cell) in currencies.iter().zip(record.iter().skip(1)) {
            let cell = cell.trim();
            if cell.is_empty() {
                cells.push(None);
                continue;
            }
            let rate: f64 = cell.parse().map_err(|_| {
                RatesError::InvalidFile(format!(
                    "{}: row {}: invalid rate {:?} for {}",
                    path.display(),
                    line + 2,
                    cell,
                    currency
                ))
            })?;
            cells.push(Some(rate));
        }
        rows.push((period, cells));
    }

    Ok(RateSheet { currencies, rows })
}

/// Load a rates file straight into a lookup table
pub fn load_currency_table(path: &Path, base_currency: &str) -> Result<CurrencyTable> {
    let table = read_rate_sheet(path)?.to_table(base_currency)?;
    info!(
        path = %path.display(),
        entries = table.len(),
        "Rates file loaded"
    );
    Ok(table)
}
