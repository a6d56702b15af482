//! Command implementations behind the `vacstat` binary

use crate::dataset::{self, CsvPartition};
use crate::error::{CliError, Result};
use crate::export::write_converted_db;
use crate::listing::{self, Field, ListingOptions};
use crate::render::{OutputFormat, Report};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use vacstat_common::config::{user_config_path, write_toml_config, TomlConfig};
use vacstat_common::partition::{partition_by_year, run_partitions, InMemoryPartition};
use vacstat_common::pipeline::YearStatistics;
use vacstat_common::{Pipeline, RateLookup, RawVacancy, StaticRates, Statistics, VacancyFilter};
use vacstat_rates::{
    collect_rates, day_windows, fetch_vacancies, load_currency_table, load_currency_table_db,
    open_database, write_rate_sheet, write_rate_sheet_db, CbrClient, CurrencyCensus, HhClient,
    RateFeed, VacancyFeed, VacancyQuery,
};

/// Where exchange rates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateSource {
    /// Rates CSV or SQLite database written by the `rates` command
    File(PathBuf),
    /// Built-in period-independent reference table
    Reference,
}

/// `.sqlite`, `.sqlite3` and `.db` files are read as databases
fn is_database(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ["sqlite", "sqlite3", "db"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

impl RateSource {
    /// Command-line choice first, then the configured rates file, then the reference table
    pub fn resolve(rates: Option<PathBuf>, static_rates: bool, config: &TomlConfig) -> Self {
        if static_rates {
            return RateSource::Reference;
        }
        match rates.or_else(|| config.rates_file.clone()) {
            Some(path) => RateSource::File(path),
            None => RateSource::Reference,
        }
    }

    pub async fn load(&self, base_currency: &str) -> Result<Arc<dyn RateLookup>> {
        match self {
            RateSource::File(path) if is_database(path) => {
                let table = load_currency_table_db(path, base_currency).await?;
                Ok(Arc::new(table))
            }
            RateSource::File(path) => {
                let table = load_currency_table(path, base_currency)?;
                Ok(Arc::new(table))
            }
            RateSource::Reference => {
                if base_currency != vacstat_common::currency::DEFAULT_BASE_CURRENCY {
                    return Err(CliError::InvalidArgument(format!(
                        "the reference rates are quoted in {}, not {}",
                        vacstat_common::currency::DEFAULT_BASE_CURRENCY,
                        base_currency
                    )));
                }
                info!("Using the built-in reference rates");
                Ok(Arc::new(StaticRates::reference()))
            }
        }
    }
}

/// Dataset layout for `stats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// One CSV file
    File(PathBuf),
    /// Directory of CSV files, one partition each
    Dir(PathBuf),
}

/// Options of the `stats` command
#[derive(Debug, Clone)]
pub struct StatsOptions {
    pub input: Input,
    pub filter: VacancyFilter,
    pub rates: RateSource,
    pub parallel: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Compute the statistics for `options`
pub async fn compute_stats(options: &StatsOptions, config: &TomlConfig) -> Result<Statistics> {
    let rates = options.rates.load(&config.base_currency).await?;
    let pipeline = Pipeline::new(config.analysis.clone());
    let workers = config.workers;

    match &options.input {
        Input::File(path) => {
            let records = dataset::read_vacancies(path)?;
            if options.parallel {
                let years = years_in_memory(
                    &records,
                    &pipeline,
                    &options.filter,
                    Arc::clone(&rates),
                    workers,
                )
                .await?;
                let regions = pipeline.run_regions(&records, rates.as_ref())?;
                Ok(Statistics::from_parts(years, regions))
            } else {
                Ok(pipeline.run(&records, &options.filter, rates.as_ref())?)
            }
        }
        Input::Dir(dir) => {
            let files = dataset::csv_files(dir)?;
            let sources: Vec<CsvPartition> = files.iter().cloned().map(CsvPartition::new).collect();
            let years = run_partitions(
                sources,
                &pipeline,
                &options.filter,
                Arc::clone(&rates),
                workers,
            )
            .await
            .into_complete()?;

            let mut records = Vec::new();
            for file in &files {
                records.extend(dataset::read_vacancies(file)?);
            }
            let regions = pipeline.run_regions(&records, rates.as_ref())?;
            Ok(Statistics::from_parts(years, regions))
        }
    }
}

async fn years_in_memory(
    records: &[RawVacancy],
    pipeline: &Pipeline,
    filter: &VacancyFilter,
    rates: Arc<dyn RateLookup>,
    workers: usize,
) -> Result<YearStatistics> {
    let (by_year, _) = partition_by_year(records.to_vec());
    let sources: Vec<InMemoryPartition> = by_year
        .into_iter()
        .map(|(year, records)| InMemoryPartition::new(year.to_string(), records))
        .collect();
    Ok(run_partitions(sources, pipeline, filter, rates, workers)
        .await
        .into_complete()?)
}

/// `stats`: compute, render and print or write the report
///
/// Returns the rendered report.
pub async fn stats(options: &StatsOptions, config: &TomlConfig) -> Result<String> {
    let statistics = compute_stats(options, config).await?;
    let filter = &options.filter;
    let report = Report::new(&filter.profession, filter.region.as_deref(), &statistics);
    let rendered = report.render(options.format)?;

    if let Some(path) = &options.output {
        std::fs::write(path, &rendered)?;
        info!(path = %path.display(), "Report written");
    }
    Ok(rendered)
}

/// Files a table is written to: CSV, SQLite or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    pub csv: Option<PathBuf>,
    pub sqlite: Option<PathBuf>,
}

impl Outputs {
    fn check(&self) -> Result<()> {
        if self.csv.is_none() && self.sqlite.is_none() {
            return Err(CliError::InvalidArgument(
                "no output given (use --output and/or --sqlite)".to_string(),
            ));
        }
        Ok(())
    }
}

/// `convert`: write normalized salaries of every convertible record
///
/// Returns the number of converted records.
pub async fn convert(
    input: &Path,
    outputs: &Outputs,
    rates: &RateSource,
    config: &TomlConfig,
) -> Result<usize> {
    outputs.check()?;
    let records = dataset::read_vacancies(input)?;
    let rates = rates.load(&config.base_currency).await?;

    let mut written = 0;
    if let Some(path) = &outputs.csv {
        written = dataset::write_converted(path, &records, rates.as_ref())?;
    }
    if let Some(path) = &outputs.sqlite {
        let pool = open_database(path).await?;
        written = write_converted_db(&pool, &records, rates.as_ref()).await?;
        pool.close().await;
    }
    Ok(written)
}

/// `split`: one file per publication year
pub fn split(input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let records = dataset::read_vacancies(input)?;
    let files = dataset::split_by_year(records, output_dir)?;
    info!(files = files.len(), dir = %output_dir.display(), "Dataset split by year");
    Ok(files)
}

/// `rates` against an arbitrary feed
pub async fn rates_with_feed(
    input: &Path,
    outputs: &Outputs,
    min_occurrences: usize,
    feed: &dyn RateFeed,
    config: &TomlConfig,
) -> Result<CurrencyCensus> {
    outputs.check()?;
    let records = dataset::read_vacancies(input)?;
    let census = CurrencyCensus::survey(&records, &config.base_currency, min_occurrences);
    let sheet = collect_rates(feed, &census.months(), census.selected.clone()).await?;

    if let Some(path) = &outputs.csv {
        write_rate_sheet(&sheet, path)?;
    }
    if let Some(path) = &outputs.sqlite {
        let pool = open_database(path).await?;
        write_rate_sheet_db(&sheet, &pool).await?;
        pool.close().await;
    }
    Ok(census)
}

/// `rates`: fetch monthly rates from the central bank archive
pub async fn rates(
    input: &Path,
    outputs: &Outputs,
    min_occurrences: Option<usize>,
    config: &TomlConfig,
) -> Result<CurrencyCensus> {
    let client = CbrClient::new(config.rates.feed_url.clone())?;
    let min_occurrences = min_occurrences.unwrap_or(config.rates.min_occurrences);
    rates_with_feed(input, outputs, min_occurrences, &client, config).await
}

/// Options of the `vacancies` command
#[derive(Debug, Clone)]
pub struct VacanciesOptions {
    pub input: PathBuf,
    pub listing: ListingOptions,
    /// Only read when sorting by salary
    pub rates: RateSource,
}

/// `vacancies`: the dataset as a filtered, sorted text table
pub async fn vacancies(options: &VacanciesOptions, config: &TomlConfig) -> Result<String> {
    let rows = dataset::read_vacancy_rows(&options.input)?;
    let sorts_by_salary = options
        .listing
        .sort
        .is_some_and(|sort| sort.field == Field::Salary);

    let rates = if sorts_by_salary {
        Some(options.rates.load(&config.base_currency).await?)
    } else {
        None
    };
    listing::list(&rows, &options.listing, rates.as_deref())
}

/// `fetch` against an arbitrary feed
///
/// Returns the number of vacancies written.
pub async fn fetch_with_feed(
    day: NaiveDate,
    output: &Path,
    feed: &dyn VacancyFeed,
    config: &TomlConfig,
) -> Result<usize> {
    let settings = &config.fetch;
    let windows = day_windows(day, settings.slices);
    let query = VacancyQuery {
        pages: settings.pages,
        per_page: settings.per_page,
        specialization: settings.specialization.filter(|s| *s != 0),
    };

    let records = fetch_vacancies(feed, &windows, &query, config.workers).await?;
    if records.is_empty() {
        warn!(%day, "No vacancies with a salary were published");
    }
    dataset::write_vacancies(output, &records)?;
    info!(path = %output.display(), vacancies = records.len(), "Vacancies written");
    Ok(records.len())
}

/// `fetch`: download one day of vacancies from the search API
pub async fn fetch(day: NaiveDate, output: &Path, config: &TomlConfig) -> Result<usize> {
    let client = HhClient::new(config.fetch.api_url.clone())?;
    fetch_with_feed(day, output, &client, config).await
}

/// `config init`: write the default configuration
///
/// Writes to `target`, or to the user configuration file when absent.
/// An existing file is only replaced with `force`.
pub fn config_init(target: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let path = target.or_else(user_config_path).ok_or_else(|| {
        CliError::InvalidArgument("no user configuration directory; pass --output".to_string())
    })?;
    if path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to replace it)",
            path.display()
        )));
    }

    write_toml_config(&TomlConfig::default(), &path)?;
    info!(path = %path.display(), "Configuration written");
    Ok(path)
}

/// `config show`: the effective configuration as TOML
pub fn config_show(config: &TomlConfig) -> Result<String> {
    Ok(config.to_toml_string()?)
}
