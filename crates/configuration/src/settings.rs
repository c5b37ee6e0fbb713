use crate::error::ConfigError;
use core_types::{PeriodGranularity, PeriodIndexing};
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section is optional; a missing `config.toml` yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisSettings,
    pub logging: LoggingSettings,
}

/// How the cohort analysis buckets and numbers periods.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Period size for both cohort groups and order periods.
    pub granularity: PeriodGranularity,
    pub indexing: PeriodIndexing,
    /// How many cohort periods the retention table shows by default.
    pub max_display_periods: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            granularity: PeriodGranularity::Month,
            indexing: PeriodIndexing::ObservedActivity,
            max_display_periods: 12,
        }
    }
}

/// Where and how verbosely the application logs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// When set, logs go to a daily rolling file in this directory instead of stderr.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "cohort.log".to_string(),
        }
    }
}

impl Config {
    /// Parses a TOML document on its own, without files or environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_display_periods == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_display_periods must be at least 1".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }
        if self.logging.file_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
