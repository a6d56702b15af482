//! SQLite rate store
//!
//! The rate sheet as a table: `date TEXT PRIMARY KEY` plus one nullable
//! `REAL` column per currency code. Writing replaces the whole table.
//!
//! ```text
//! currency(date, EUR, USD)
//! ('2019-08', 73.3, 66.1441)
//! ('2019-09', NULL, 64.6)
//! ```

use crate::collect::RateSheet;
use crate::error::{RatesError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;
use vacstat_common::CurrencyTable;

/// Table holding the rate sheet
pub const RATES_TABLE: &str = "currency";

const DATE_COLUMN: &str = "date";

/// Open (creating if needed) the SQLite database at `path`
pub async fn open_database(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    info!("Opened database: {}", path.display());
    Ok(pool)
}

/// Currency codes become column names, so only plain codes are accepted
fn column_name(currency: &str) -> Result<String> {
    if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RatesError::InvalidFile(format!(
            "currency code {:?} cannot be a column name",
            currency
        )));
    }
    Ok(format!("\"{}\"", currency))
}

/// Replace the rates table with `sheet`
pub async fn write_rate_sheet_db(sheet: &RateSheet, pool: &SqlitePool) -> Result<()> {
    let columns = sheet
        .currencies
        .iter()
        .map(String::as_str)
        .map(column_name)
        .collect::<Result<Vec<_>>>()?;

    let mut create = format!("CREATE TABLE {} ({} TEXT PRIMARY KEY", RATES_TABLE, DATE_COLUMN);
    for column in &columns {
        create.push_str(&format!(", {} REAL", column));
    }
    create.push(')');

    let mut names = vec![DATE_COLUMN.to_string()];
    names.extend(columns.iter().cloned());
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        RATES_TABLE,
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    );

    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", RATES_TABLE))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&create).execute(&mut *tx).await?;

    for (period, cells) in &sheet.rows {
        let mut query = sqlx::query(&insert).bind(period);
        for cell in cells {
            query = query.bind(*cell);
        }
        query.execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!(periods = sheet.rows.len(), "Rates table written");
    Ok(())
}

/// Read the rates table written by [`write_rate_sheet_db`]
pub async fn read_rate_sheet_db(pool: &SqlitePool) -> Result<RateSheet> {
    let names: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT name FROM pragma_table_info('{}') ORDER BY cid",
        RATES_TABLE
    ))
    .fetch_all(pool)
    .await?;

    match names.first() {
        Some(first) if first == DATE_COLUMN => {}
        Some(_) => {
            return Err(RatesError::InvalidFile(format!(
                "table '{}': first column must be '{}'",
                RATES_TABLE, DATE_COLUMN
            )))
        }
        None => {
            return Err(RatesError::InvalidFile(format!(
                "no '{}' table",
                RATES_TABLE
            )))
        }
    }
    let currencies: Vec<String> = names[1..].to_vec();

    let rows = sqlx::query(&format!(
        "SELECT * FROM {} ORDER BY {}",
        RATES_TABLE, DATE_COLUMN
    ))
    .fetch_all(pool)
    .await?;

    let mut sheet_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let period: String = row.try_get(0)?;
        let mut cells = Vec::with_capacity(currencies.len());
        for index in 1..=currencies.len() {
            cells.push(row.try_get::<Option<f64>, _>(index)?);
        }
        sheet_rows.push((period, cells));
    }

    Ok(RateSheet {
        currencies,
        rows: sheet_rows,
    })
}

/// Load the rates table of the database at `path` into a lookup table
pub async fn load_currency_table_db(path: &Path, base_currency: &str) -> Result<CurrencyTable> {
    if !path.exists() {
        return Err(RatesError::InvalidFile(format!("{} does not exist", path.display())));
    }
    let pool = open_database(path).await?;
    let sheet = read_rate_sheet_db(&pool).await?;
    pool.close().await;

    let table = sheet.to_table(base_currency)?;
    info!(
        path = %path.display(),
        entries = table.len(),
        "Rates database loaded"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> RateSheet {
        RateSheet {
            currencies: vec!["EUR".into(), "USD".into()],
            rows: vec![
                ("2019-08".into(), vec![Some(73.3), Some(66.1441)]),
                ("2019-09".into(), vec![None, Some(64.6)]),
            ],
        }
    }

    #[tokio::test]
    async fn test_sheet_written_as_table_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_database(&dir.path().join("rates.sqlite")).await.unwrap();

        write_rate_sheet_db(&sheet(), &pool).await.unwrap();

        let usd: Option<f64> = sqlx::query_scalar("SELECT USD FROM currency WHERE date = ?")
            .bind("2019-09")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(usd, Some(64.6));

        let eur: Option<f64> = sqlx::query_scalar("SELECT EUR FROM currency WHERE date = ?")
            .bind("2019-09")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(eur, None);

        assert_eq!(read_rate_sheet_db(&pool).await.unwrap(), sheet());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_database(&dir.path().join("rates.sqlite")).await.unwrap();

        write_rate_sheet_db(&sheet(), &pool).await.unwrap();
        let smaller = RateSheet {
            currencies: vec!["KZT".into()],
            rows: vec![("2020-01".into(), vec![Some(0.1707)])],
        };
        write_rate_sheet_db(&smaller, &pool).await.unwrap();

        assert_eq!(read_rate_sheet_db(&pool).await.unwrap(), smaller);
    }

    #[tokio::test]
    async fn test_odd_currency_code_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_database(&dir.path().join("rates.sqlite")).await.unwrap();
        let sheet = RateSheet {
            currencies: vec!["US D".into()],
            rows: Vec::new(),
        };
        assert!(matches!(
            write_rate_sheet_db(&sheet, &pool).await,
            Err(RatesError::InvalidFile(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_table_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_database(&dir.path().join("empty.sqlite")).await.unwrap();
        assert!(matches!(read_rate_sheet_db(&pool).await, Err(RatesError::InvalidFile(_))));

        let missing = dir.path().join("missing.sqlite");
        assert!(load_currency_table_db(&missing, "RUR").await.is_err());
        assert!(!missing.exists());
    }
}
