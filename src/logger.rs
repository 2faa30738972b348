//! Logging setup.
//!
//! The library only emits `tracing` events; binaries call
//! [`LoggerConfig::init`] once to install a formatter.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Subscriber settings for binaries and simulators.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoggerConfig {
    pub level: String,
    pub ansi: bool,
}

impl LoggerConfig {
    /// Loads logging configuration from `LOG_LEVEL` and `LOG_ANSI`.
    /// Missing variables fall back to `info` with colors enabled.
    pub fn from_env() -> Self {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let ansi = std::env::var("LOG_ANSI")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self { level, ansi }
    }

    /// Parsed level, `INFO` when the configured value is not a level name.
    pub fn max_level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG` directives win over `level` when set. Calling this twice is
    /// harmless, the second subscriber is ignored.
    pub fn init(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.max_level().as_str()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(self.ansi)
            .with_target(true)
            .try_init();

        tracing::debug!(level = %self.level, "logging initialised");
        Ok(())
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}
