//! vacstat - vacancy salary statistics
//!
//! ```bash
//! vacstat stats vacancies.csv --profession "Python" --format html --output report.html
//! vacstat vacancies vacancies.csv --filter "premium: yes" --sort salary --reverse --rows "1 20"
//! vacstat rates vacancies.csv --output currency.csv --sqlite rates.sqlite
//! vacstat fetch --date 2022-12-29 --output hh.csv
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use vacstat_cli::commands::{self, Input, Outputs, RateSource, StatsOptions, VacanciesOptions};
use vacstat_cli::listing::{Field, Filter, ListingOptions, RowRange, Sort};
use vacstat_cli::render::OutputFormat;
use vacstat_cli::{logging, CliError};
use vacstat_common::config::{ConfigResolver, TomlConfig};
use vacstat_common::VacancyFilter;

/// Vacancy salary statistics
#[derive(Parser, Debug)]
#[clap(name = "vacstat", version)]
#[clap(about = "Normalize vacancy salaries and aggregate them by year and region")]
struct Args {
    /// Configuration file (overrides VACSTAT_CONFIG)
    #[clap(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Salary and vacancy statistics for a profession
    Stats {
        /// Vacancy CSV file
        #[clap(required_unless_present = "dir", conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// Directory of per-year CSV files (processed in parallel)
        #[clap(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Substring of the vacancy name
        #[clap(long)]
        profession: String,

        /// Restrict profession statistics to one region
        #[clap(long)]
        region: Option<String>,

        #[clap(flatten)]
        rates: RatesArgs,

        /// Process year partitions in parallel
        #[clap(long)]
        parallel: bool,

        #[clap(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[clap(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List vacancies as a table
    Vacancies {
        file: PathBuf,

        /// Keep rows matching "param: value", e.g. "premium: yes"
        #[clap(long, value_name = "PARAM: VALUE")]
        filter: Option<Filter>,

        /// Sort by this column
        #[clap(long, value_name = "COLUMN")]
        sort: Option<Field>,

        /// Sort descending
        #[clap(long, requires = "sort")]
        reverse: bool,

        /// Row numbers to show: "FROM" or "FROM TO" (TO excluded)
        #[clap(long, value_name = "FROM [TO]")]
        rows: Option<RowRange>,

        /// Comma-separated columns to show
        #[clap(long, value_name = "COLUMNS", value_delimiter = ',')]
        columns: Vec<Field>,

        #[clap(flatten)]
        rates: RatesArgs,
    },

    /// Write normalized salaries of every convertible vacancy
    Convert {
        file: PathBuf,

        /// Converted CSV file
        #[clap(long, value_name = "PATH", required_unless_present = "sqlite")]
        output: Option<PathBuf>,

        /// SQLite database receiving a `vacancies` table
        #[clap(long, value_name = "PATH")]
        sqlite: Option<PathBuf>,

        #[clap(flatten)]
        rates: RatesArgs,
    },

    /// Split a dataset into one CSV file per publication year
    Split {
        file: PathBuf,

        #[clap(long, value_name = "DIR")]
        output_dir: PathBuf,
    },

    /// Fetch monthly central bank rates for the frequent currencies of a dataset
    Rates {
        file: PathBuf,

        /// Rates CSV file
        #[clap(long, value_name = "PATH", required_unless_present = "sqlite")]
        output: Option<PathBuf>,

        /// SQLite database receiving a `currency` table
        #[clap(long, value_name = "PATH")]
        sqlite: Option<PathBuf>,

        /// A currency must occur more often than this to be fetched
        #[clap(long)]
        min_occurrences: Option<usize>,
    },

    /// Download one day of vacancies from the search API
    Fetch {
        /// Publication day (YYYY-MM-DD)
        #[clap(long)]
        date: NaiveDate,

        #[clap(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Configuration file management
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Target file (default: the user configuration file)
        #[clap(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Replace an existing file
        #[clap(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(clap::Args, Debug)]
struct RatesArgs {
    /// Rates file written by `vacstat rates` (CSV, or SQLite by extension)
    #[clap(long, value_name = "PATH", conflicts_with = "static_rates")]
    rates: Option<PathBuf>,

    /// Use the built-in reference rates
    #[clap(long)]
    static_rates: bool,
}

impl RatesArgs {
    fn source(self, config: &TomlConfig) -> RateSource {
        RateSource::resolve(self.rates, self.static_rates, config)
    }
}

async fn run(args: Args, config: TomlConfig) -> Result<()> {
    match args.command {
        Command::Stats {
            file,
            dir,
            profession,
            region,
            rates,
            parallel,
            format,
            output,
        } => {
            let input = match (file, dir) {
                (_, Some(dir)) => Input::Dir(dir),
                (Some(file), None) => Input::File(file),
                (None, None) => anyhow::bail!("either FILE or --dir is required"),
            };
            let mut filter = VacancyFilter::new(profession);
            if let Some(region) = region {
                filter = filter.with_region(region);
            }
            let options = StatsOptions {
                input,
                filter,
                rates: rates.source(&config),
                parallel,
                format,
                output,
            };

            let rendered = commands::stats(&options, &config).await?;
            if options.output.is_none() {
                print!("{}", rendered);
            }
        }
        Command::Vacancies {
            file,
            filter,
            sort,
            reverse,
            rows,
            columns,
            rates,
        } => {
            let options = VacanciesOptions {
                input: file,
                listing: ListingOptions {
                    filter,
                    sort: sort.map(|field| Sort {
                        field,
                        descending: reverse,
                    }),
                    range: rows.unwrap_or_default(),
                    columns,
                },
                rates: rates.source(&config),
            };
            print!("{}", commands::vacancies(&options, &config).await?);
        }
        Command::Convert {
            file,
            output,
            sqlite,
            rates,
        } => {
            let source = rates.source(&config);
            let outputs = Outputs { csv: output, sqlite };
            let written = commands::convert(&file, &outputs, &source, &config)
                .await
                .with_context(|| format!("Failed to convert {}", file.display()))?;
            info!(written, "Conversion completed");
        }
        Command::Split { file, output_dir } => {
            let files = commands::split(&file, &output_dir)
                .with_context(|| format!("Failed to split {}", file.display()))?;
            for path in files {
                println!("{}", path.display());
            }
        }
        Command::Rates {
            file,
            output,
            sqlite,
            min_occurrences,
        } => {
            let outputs = Outputs { csv: output, sqlite };
            let census = commands::rates(&file, &outputs, min_occurrences, &config).await?;
            println!(
                "Currencies: {}",
                if census.selected.is_empty() {
                    "none".to_string()
                } else {
                    census.selected.join(", ")
                }
            );
            for path in outputs.csv.iter().chain(&outputs.sqlite) {
                println!("Rates written to {}", path.display());
            }
        }
        Command::Fetch { date, output } => {
            let written = commands::fetch(date, &output, &config)
                .await
                .with_context(|| format!("Failed to fetch vacancies of {}", date))?;
            println!("{} vacancies written to {}", written, output.display());
        }
        Command::Config { action } => match action {
            ConfigAction::Init { output, force } => {
                let path = commands::config_init(output, force)?;
                println!("Configuration written to {}", path.display());
            }
            ConfigAction::Show => print!("{}", commands::config_show(&config)?),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = logging::init();

    let config = match ConfigResolver::new(args.config.clone()).load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log_level.apply(&config.logging.level);
    info!("vacstat {}", env!("CARGO_PKG_VERSION"));

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<CliError>() {
            Some(err) if err.is_empty_input() => {
                eprintln!("No data");
                ExitCode::FAILURE
            }
            Some(CliError::NoMatches) => {
                eprintln!("Nothing found");
                ExitCode::FAILURE
            }
            _ => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}
