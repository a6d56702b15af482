//! Configuration resolution and persistence
//!
//! Uses serial_test: tests that touch VACSTAT_CONFIG or XDG_CONFIG_HOME run
//! one at a time.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use vacstat_common::config::{
    write_toml_config, ConfigResolver, ConfigSource, TomlConfig, CONFIG_ENV_VAR,
};
use vacstat_common::Error;

#[test]
#[serial]
fn test_env_var_used_when_no_cli_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.toml");
    std::fs::write(&path, "workers = 2\n[analysis]\ntop_regions = 3\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.source(), ConfigSource::Environment(path.clone()));

    let config = resolver.load().unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.workers, 2);
    assert_eq!(config.analysis.top_regions, 3);
}

#[test]
#[serial]
fn test_cli_path_overrides_env_var() {
    let dir = tempfile::tempdir().unwrap();
    let cli_path = dir.path().join("cli.toml");
    let env_path = dir.path().join("env.toml");
    std::fs::write(&cli_path, "base_currency = \"EUR\"\n").unwrap();
    std::fs::write(&env_path, "base_currency = \"USD\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = ConfigResolver::new(Some(cli_path)).load().unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.base_currency, "EUR");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let resolver = ConfigResolver::new(Some(PathBuf::from("/nonexistent/vacstat.toml")));
    assert!(matches!(resolver.load(), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_invalid_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[analysis]\nshare_threshold = -0.5\n").unwrap();

    let result = ConfigResolver::new(Some(path)).load();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_write_then_load_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.rates_file = Some(PathBuf::from("currency.csv"));
    config.analysis.share_threshold = 0.02;
    config.rates.min_occurrences = 100;
    config.logging.level = "debug".to_string();

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

/// Log sink shared with a test subscriber
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_broken_user_file_warns_and_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let user_file = dir.path().join("vacstat").join("config.toml");
    std::fs::create_dir_all(user_file.parent().unwrap()).unwrap();
    std::fs::write(&user_file, "workers = \"many\"\n").unwrap();

    env::remove_var(CONFIG_ENV_VAR);
    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let resolver = ConfigResolver::new(None);
    let source = resolver.source();
    let result = tracing::subscriber::with_default(subscriber, || resolver.load());

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(source, ConfigSource::UserFile(user_file.clone()));
    assert_eq!(result.unwrap(), TomlConfig::default());

    let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("WARN"), "no warning in {:?}", logs);
    assert!(logs.contains(&format!("Ignoring {}", user_file.display())));
    assert!(logs.contains("using defaults"));
}

#[test]
fn test_default_config_serializes_and_parses_back() {
    let text = TomlConfig::default().to_toml_string().unwrap();
    assert!(text.contains("[fetch]"));
    assert!(!text.contains("rates_file"));
    assert_eq!(TomlConfig::from_toml_str(&text).unwrap(), TomlConfig::default());
}
