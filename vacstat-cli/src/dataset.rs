//! Vacancy CSV reading and writing
//!
//! Cells are cleaned before use: HTML tags removed, `\r\n`, NBSP and EN SPACE
//! turned into spaces, runs of spaces collapsed, ends trimmed. Rows whose
//! field count differs from the header are dropped, as are rows without a
//! name, region or publication date.

use crate::error::{CliError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vacstat_common::normalizer::SalaryNormalizer;
use vacstat_common::partition::{partition_by_year, PartitionSource};
use vacstat_common::{RateLookup, RawVacancy};

const NAME: &str = "name";
const SALARY_FROM: &str = "salary_from";
const SALARY_TO: &str = "salary_to";
const SALARY_CURRENCY: &str = "salary_currency";
const AREA_NAME: &str = "area_name";
const REGION: &str = "region";
const PUBLISHED_AT: &str = "published_at";

/// Header written by [`write_vacancies`]
pub const VACANCY_HEADER: [&str; 6] =
    [NAME, SALARY_FROM, SALARY_TO, SALARY_CURRENCY, AREA_NAME, PUBLISHED_AT];

/// Header written by [`write_converted`]
pub const CONVERTED_HEADER: [&str; 4] = [NAME, "salary", AREA_NAME, PUBLISHED_AT];

/// Cell text normalizer
pub struct CellCleaner {
    tags: Regex,
    spaces: Regex,
}

impl CellCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tags: Regex::new(r"<[^>]*>")?,
            spaces: Regex::new(r" {2,}")?,
        })
    }

    pub fn clean(&self, raw: &str) -> String {
        let text = self.tags.replace_all(raw, "");
        let text = text.replace("\r\n", " ").replace(['\u{a0}', '\u{2002}'], " ");
        self.spaces.replace_all(text.trim(), " ").into_owned()
    }
}

/// Column positions of the required fields
#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    salary_from: usize,
    salary_to: usize,
    salary_currency: usize,
    region: usize,
    published_at: usize,
}

impl Columns {
    fn positions(&self) -> [usize; 6] {
        [
            self.name,
            self.salary_from,
            self.salary_to,
            self.salary_currency,
            self.region,
            self.published_at,
        ]
    }

    fn locate(headers: &[String]) -> Result<Self> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| CliError::MissingColumn(column.to_string()))
        };
        let region = find(AREA_NAME).or_else(|_| find(REGION)).map_err(|_| {
            CliError::MissingColumn(format!("{} (or {})", AREA_NAME, REGION))
        })?;

        Ok(Self {
            name: find(NAME)?,
            salary_from: find(SALARY_FROM)?,
            salary_to: find(SALARY_TO)?,
            salary_currency: find(SALARY_CURRENCY)?,
            region,
            published_at: find(PUBLISHED_AT)?,
        })
    }
}

fn parse_salary(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A vacancy together with the other columns of its row
#[derive(Debug, Clone, PartialEq)]
pub struct VacancyRow {
    pub vacancy: RawVacancy,
    /// Cleaned cells of every non-core column, by header name
    pub extra: BTreeMap<String, String>,
}

/// Every usable row of a dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VacancyRows {
    /// Non-core columns in header order
    pub extra_columns: Vec<String>,
    pub rows: Vec<VacancyRow>,
}

/// Read and clean every vacancy in `path`
///
/// # Errors
/// - [`CliError::MissingColumn`] when a required column is absent
/// - `EmptyInput` when no row survives cleaning
pub fn read_vacancies(path: &Path) -> Result<Vec<RawVacancy>> {
    let rows = read_rows(path, false)?;
    Ok(rows.rows.into_iter().map(|row| row.vacancy).collect())
}

/// Like [`read_vacancies`], keeping the non-core columns as well
pub fn read_vacancy_rows(path: &Path) -> Result<VacancyRows> {
    read_rows(path, true)
}

fn read_rows(path: &Path, keep_extra: bool) -> Result<VacancyRows> {
    let cleaner = CellCleaner::new()?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let columns = Columns::locate(&headers)?;

    let core = columns.positions();
    let extra_columns: Vec<(usize, String)> = if keep_extra {
        headers
            .iter()
            .enumerate()
            .filter(|(index, _)| !core.contains(index))
            .map(|(index, header)| (index, header.clone()))
            .collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    let mut incomplete = 0usize;

    for result in reader.records() {
        let row = result?;
        if row.len() != headers.len() {
            malformed += 1;
            continue;
        }
        let cell = |index: usize| cleaner.clean(row.get(index).unwrap_or_default());

        let name = cell(columns.name);
        let region = cell(columns.region);
        let published_at = cell(columns.published_at);
        if name.is_empty() || region.is_empty() || published_at.is_empty() {
            incomplete += 1;
            continue;
        }
        let currency = cell(columns.salary_currency);

        let vacancy = RawVacancy {
            name,
            salary_from: parse_salary(&cell(columns.salary_from)),
            salary_to: parse_salary(&cell(columns.salary_to)),
            salary_currency: (!currency.is_empty()).then_some(currency),
            region,
            published_at,
        };
        let extra = extra_columns
            .iter()
            .map(|(index, header)| (header.clone(), cell(*index)))
            .collect();
        rows.push(VacancyRow { vacancy, extra });
    }

    if malformed + incomplete > 0 {
        warn!(
            path = %path.display(),
            malformed,
            incomplete,
            "Dropped unusable rows"
        );
    }
    info!(path = %path.display(), records = rows.len(), "Dataset loaded");

    if rows.is_empty() {
        return Err(vacstat_common::Error::EmptyInput.into());
    }
    Ok(VacancyRows {
        extra_columns: extra_columns.into_iter().map(|(_, header)| header).collect(),
        rows,
    })
}

fn format_bound(bound: Option<f64>) -> String {
    bound.map(|v| v.to_string()).unwrap_or_default()
}

/// Write records with the canonical six-column header
pub fn write_vacancies(path: &Path, records: &[RawVacancy]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(VACANCY_HEADER)?;
    for record in records {
        writer.write_record([
            record.name.as_str(),
            format_bound(record.salary_from).as_str(),
            format_bound(record.salary_to).as_str(),
            record.salary_currency.as_deref().unwrap_or_default(),
            record.region.as_str(),
            record.published_at.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Every convertible record with its normalized salary, in input order
pub fn converted<'a>(
    records: &'a [RawVacancy],
    rates: &dyn RateLookup,
) -> Vec<(&'a RawVacancy, f64)> {
    let normalizer = SalaryNormalizer::new(rates);
    records
        .iter()
        .filter_map(|record| normalizer.normalize(record).value().map(|salary| (record, salary)))
        .collect()
}

/// Write every convertible record with its normalized salary
///
/// Returns the number of rows written.
pub fn write_converted(
    path: &Path,
    records: &[RawVacancy],
    rates: &dyn RateLookup,
) -> Result<usize> {
    let rows = converted(records, rates);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CONVERTED_HEADER)?;
    for (record, salary) in &rows {
        writer.write_record([
            record.name.as_str(),
            salary.to_string().as_str(),
            record.region.as_str(),
            record.published_at.as_str(),
        ])?;
    }
    writer.flush()?;

    info!(
        path = %path.display(),
        written = rows.len(),
        skipped = records.len() - rows.len(),
        "Converted dataset written"
    );
    Ok(rows.len())
}

/// Write one `<year>.csv` per publication year into `dir`
///
/// Returns the written files, ascending by year. Undated records are dropped.
pub fn split_by_year(records: Vec<RawVacancy>, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let (by_year, undated) = partition_by_year(records);
    if !undated.is_empty() {
        warn!(undated = undated.len(), "Records without a publication year dropped");
    }

    let mut written = Vec::with_capacity(by_year.len());
    for (year, records) in by_year {
        let path = dir.join(format!("{}.csv", year));
        write_vacancies(&path, &records)?;
        debug!(year, records = records.len(), path = %path.display(), "Year file written");
        written.push(path);
    }
    Ok(written)
}

/// Every `*.csv` file directly inside `dir`, sorted by name
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "no CSV files in {}",
            dir.display()
        )));
    }
    Ok(files)
}

/// One CSV file treated as one partition
#[derive(Debug, Clone)]
pub struct CsvPartition {
    path: PathBuf,
}

impl CsvPartition {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PartitionSource for CsvPartition {
    fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn load(&self) -> vacstat_common::Result<Vec<RawVacancy>> {
        read_vacancies(&self.path).map_err(CliError::into_common)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cleaner_strips_tags_and_odd_spaces() {
        let cleaner = CellCleaner::new().unwrap();
        assert_eq!(
            cleaner.clean("  <p><b>Senior</b>\u{a0}Rust\r\ndeveloper</p>   (remote)\u{2002} "),
            "Senior Rust developer (remote)"
        );
        assert_eq!(cleaner.clean(""), "");
    }

    #[test]
    fn test_reader_drops_bad_rows_and_parses_salaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v.csv",
            "\u{feff}name,key_skills,salary_from,salary_to,salary_currency,area_name,published_at\n\
             <b>Engineer</b>,Rust,1000,2000,RUR,Moscow,2020-03-01T10:00:00+0300\n\
             Manager,,,,RUR,Kazan,2020-04-01T10:00:00+0300\n\
             Short,row\n\
             ,Rust,1,2,RUR,Moscow,2020-01-01T00:00:00+0300\n\
             Analyst,SQL,abc,3000.5,,Omsk,2021-01-01T00:00:00+0300\n",
        );

        let records = read_vacancies(&path).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].name, "Engineer");
        assert_eq!(records[0].salary_from, Some(1000.0));
        assert_eq!(records[0].salary_currency.as_deref(), Some("RUR"));

        assert_eq!(records[1].salary_from, None);
        assert_eq!(records[1].salary_to, None);

        assert_eq!(records[2].salary_from, None);
        assert_eq!(records[2].salary_to, Some(3000.5));
        assert_eq!(records[2].salary_currency, None);
    }

    #[test]
    fn test_rows_keep_non_core_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v.csv",
            "name,description,salary_from,salary_to,salary_currency,area_name,premium,\
             published_at\n\
             Dev,<p>Backend  work</p>,1,2,RUR,Tver,True,2020-01-01\n",
        );

        let rows = read_vacancy_rows(&path).unwrap();
        assert_eq!(rows.extra_columns, vec!["description", "premium"]);
        assert_eq!(rows.rows[0].vacancy.region, "Tver");
        assert_eq!(rows.rows[0].extra["description"], "Backend work");
        assert_eq!(rows.rows[0].extra["premium"], "True");

        assert_eq!(read_vacancies(&path).unwrap(), vec![rows.rows[0].vacancy.clone()]);
    }

    #[test]
    fn test_region_column_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v.csv",
            "name,salary_from,salary_to,salary_currency,region,published_at\n\
             Dev,1,2,RUR,Tver,2020-01-01\n",
        );
        assert_eq!(read_vacancies(&path).unwrap()[0].region, "Tver");
    }

    #[test]
    fn test_missing_column_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let no_currency = write(
            dir.path(),
            "a.csv",
            "name,salary_from,salary_to,area_name,published_at\nDev,1,2,Tver,2020-01-01\n",
        );
        match read_vacancies(&no_currency) {
            Err(CliError::MissingColumn(column)) => assert_eq!(column, "salary_currency"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }

        let header_only = write(
            dir.path(),
            "b.csv",
            "name,salary_from,salary_to,salary_currency,area_name,published_at\n",
        );
        let err = read_vacancies(&header_only).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_csv_partition_reports_core_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "2019.csv", "name,salary_from\nDev,1\n");
        let partition = CsvPartition::new(path);

        assert_eq!(partition.label(), "2019.csv");
        assert!(matches!(
            partition.load(),
            Err(vacstat_common::Error::InvalidInput(_))
        ));
    }
}
