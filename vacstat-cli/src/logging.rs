//! Logging setup for the `vacstat` binary
//!
//! The subscriber is installed before the configuration is resolved, so
//! warnings raised while loading it reach stderr. `RUST_LOG` wins; without
//! it logging starts at `info` and switches to `logging.level` once the
//! configuration is known.

use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const STARTUP_LEVEL: &str = "info";

/// Handle for switching the log level after startup
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

/// Install the stderr subscriber
pub fn init() -> LogLevel {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(STARTUP_LEVEL), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    LogLevel { handle, from_env }
}

impl LogLevel {
    /// Switch to the configured level unless `RUST_LOG` chose one
    pub fn apply(&self, level: &str) {
        if self.from_env {
            return;
        }
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = self.handle.reload(filter) {
                    warn!("Cannot change log level: {}", e);
                }
            }
            Err(e) => warn!("Ignoring logging.level {:?}: {}", level, e),
        }
    }
}
