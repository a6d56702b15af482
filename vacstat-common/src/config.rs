//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `VACSTAT_CONFIG` environment variable
//! 3. `<user config dir>/vacstat/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file at steps 3-4 is not an error. An explicitly named file
//! (steps 1-2) that cannot be read or parsed is.

use crate::currency::DEFAULT_BASE_CURRENCY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VACSTAT_CONFIG";

/// Root configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Currency every salary is normalized into
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Rates CSV or SQLite file written by `vacstat rates` (static reference rates if absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates_file: Option<PathBuf>,

    /// Partitions processed concurrently in partitioned mode
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub rates: RatesSettings,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            rates_file: None,
            workers: default_workers(),
            analysis: AnalysisSettings::default(),
            rates: RatesSettings::default(),
            fetch: FetchSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Aggregation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Minimum fraction of all vacancies a region needs to be reported
    #[serde(default = "default_share_threshold")]
    pub share_threshold: f64,

    /// Regions listed in the salary and share rankings
    #[serde(default = "default_top_regions")]
    pub top_regions: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            share_threshold: default_share_threshold(),
            top_regions: default_top_regions(),
        }
    }
}

/// Rate retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesSettings {
    /// A currency must occur more often than this to be fetched
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,

    /// Base URL of the daily rates archive
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
}

impl Default for RatesSettings {
    fn default() -> Self {
        Self {
            min_occurrences: default_min_occurrences(),
            feed_url: default_feed_url(),
        }
    }
}

/// Vacancy search API settings for `vacstat fetch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Time windows a day is cut into
    #[serde(default = "default_slices")]
    pub slices: u32,

    /// Pages requested per window at most
    #[serde(default = "default_pages")]
    pub pages: u32,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Specialization filter of the search; 0 searches every specialization
    #[serde(default = "default_specialization", skip_serializing_if = "Option::is_none")]
    pub specialization: Option<u32>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            slices: default_slices(),
            pages: default_pages(),
            per_page: default_per_page(),
            specialization: default_specialization(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_workers() -> usize {
    4
}

fn default_share_threshold() -> f64 {
    0.01
}

fn default_top_regions() -> usize {
    10
}

fn default_min_occurrences() -> usize {
    5000
}

fn default_feed_url() -> String {
    "https://www.cbr-xml-daily.ru/archive".to_string()
}

fn default_api_url() -> String {
    "https://api.hh.ru/vacancies".to_string()
}

fn default_slices() -> u32 {
    4
}

fn default_pages() -> u32 {
    20
}

fn default_per_page() -> u32 {
    100
}

fn default_specialization() -> Option<u32> {
    Some(1)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Pretty TOML text of the configuration
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize configuration: {}", e)))
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_currency.trim().is_empty() {
            return Err(Error::Config("base_currency must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        let threshold = self.analysis.share_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "analysis.share_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.analysis.top_regions == 0 {
            return Err(Error::Config("analysis.top_regions must be at least 1".to_string()));
        }
        if !(1..=24).contains(&self.fetch.slices) {
            return Err(Error::Config(format!(
                "fetch.slices must be within [1, 24], got {}",
                self.fetch.slices
            )));
        }
        if self.fetch.pages == 0 {
            return Err(Error::Config("fetch.pages must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.fetch.per_page) {
            return Err(Error::Config(format!(
                "fetch.per_page must be within [1, 100], got {}",
                self.fetch.per_page
            )));
        }
        Ok(())
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserFile(PathBuf),
    Defaults,
}

/// Resolves and loads the configuration file
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Pick the configuration source by priority
    pub fn source(&self) -> ConfigSource {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return ConfigSource::CommandLine(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        // Priority 3: User config file, only when it exists
        if let Some(path) = user_config_path() {
            if path.exists() {
                return ConfigSource::UserFile(path);
            }
        }

        // Priority 4: Compiled defaults
        ConfigSource::Defaults
    }

    /// Load the configuration from the resolved source
    pub fn load(&self) -> Result<TomlConfig> {
        match self.source() {
            ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::load(&path)
            }
            ConfigSource::UserFile(path) => match TomlConfig::load(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    warn!("Ignoring {}: {} (using defaults)", path.display(), e);
                    Ok(TomlConfig::default())
                }
            },
            ConfigSource::Defaults => {
                debug!("No configuration file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// `<user config dir>/vacstat/config.toml`, if the platform has one
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vacstat").join("config.toml"))
}

/// Write a configuration file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = config.to_toml_string()?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.base_currency, "RUR");
        assert_eq!(config.workers, 4);
        assert_eq!(config.analysis.share_threshold, 0.01);
        assert_eq!(config.analysis.top_regions, 10);
        assert_eq!(config.rates.min_occurrences, 5000);
        assert_eq!(config.logging.level, "info");
        assert!(config.rates_file.is_none());
        assert_eq!(config.fetch.slices, 4);
        assert_eq!(config.fetch.per_page, 100);
        assert_eq!(config.fetch.specialization, Some(1));
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_keys() {
        let config = TomlConfig::from_toml_str(
            r#"
            rates_file = "currency.csv"

            [analysis]
            top_regions = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.rates_file, Some(PathBuf::from("currency.csv")));
        assert_eq!(config.analysis.top_regions, 5);
        assert_eq!(config.analysis.share_threshold, 0.01);
        assert_eq!(config.base_currency, "RUR");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(TomlConfig::from_toml_str("workers = 0").is_err());
        assert!(TomlConfig::from_toml_str("base_currency = \"\"").is_err());
        assert!(TomlConfig::from_toml_str("[analysis]\nshare_threshold = 1.5").is_err());
        assert!(TomlConfig::from_toml_str("[analysis]\ntop_regions = 0").is_err());
        assert!(TomlConfig::from_toml_str("workers = \"many\"").is_err());
        assert!(TomlConfig::from_toml_str("[fetch]\nslices = 0").is_err());
        assert!(TomlConfig::from_toml_str("[fetch]\nper_page = 500").is_err());
    }

    #[test]
    fn test_cli_path_has_highest_priority() {
        let resolver = ConfigResolver::new(Some(PathBuf::from("/tmp/explicit.toml")));
        assert_eq!(
            resolver.source(),
            ConfigSource::CommandLine(PathBuf::from("/tmp/explicit.toml"))
        );
    }
}
