//! # vacstat common library
//!
//! Core of the vacancy salary analysis shared by the rates tool and the CLI:
//! - Raw vacancy records and the profession/region filter
//! - Exchange-rate lookup (period table and static rates)
//! - Salary normalization into the base currency
//! - Keyed count/average accumulators with threshold filtering
//! - The single-pass analysis pipeline and its partitioned variant
//! - Configuration loading

pub mod accumulators;
pub mod config;
pub mod currency;
pub mod error;
pub mod normalizer;
pub mod partition;
pub mod pipeline;
pub mod vacancy;

pub use currency::{CurrencyTable, RateLookup, StaticRates};
pub use error::{Error, PartitionFailure, Result};
pub use pipeline::{Pipeline, Statistics};
pub use vacancy::{RawVacancy, VacancyFilter};
