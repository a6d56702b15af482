//! # vacstat rates
//!
//! Builds the period rate table for a vacancy dataset and fetches datasets:
//! - [`census`]: which currencies are frequent enough to need rates, over which months
//! - [`feed`]: the central bank daily rates archive client
//! - [`collect`]: one observation per month into a [`collect::RateSheet`]
//! - [`store`]: the rates CSV file
//! - [`db`]: the SQLite rate store
//! - [`vacancy_feed`]: the vacancy search API client

pub mod census;
pub mod collect;
pub mod db;
pub mod error;
pub mod feed;
mod http;
pub mod months;
pub mod store;
pub mod vacancy_feed;

pub use census::CurrencyCensus;
pub use collect::{collect_rates, RateSheet};
pub use db::{load_currency_table_db, open_database, read_rate_sheet_db, write_rate_sheet_db};
pub use error::{RatesError, Result};
pub use feed::{CbrClient, DailyRates, RateFeed};
pub use store::{load_currency_table, read_rate_sheet, write_rate_sheet};
pub use vacancy_feed::{
    day_windows, fetch_vacancies, HhClient, TimeWindow, VacancyFeed, VacancyPage, VacancyQuery,
};
