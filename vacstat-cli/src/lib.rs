//! # vacstat CLI
//!
//! Dataset reading, listing, report rendering, SQLite export and the
//! commands of the `vacstat` binary.

pub mod commands;
pub mod dataset;
pub mod error;
pub mod export;
pub mod listing;
pub mod logging;
pub mod render;

pub use error::{CliError, Result};
