use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{AnalysisSettings, Config, LoggingSettings};

/// Loads the application configuration from `config.toml` in the working
/// directory, if present, layered under `COHORT__`-prefixed environment
/// variables (e.g. `COHORT__ANALYSIS__GRANULARITY=quarter`).
pub fn load_config() -> Result<Config, ConfigError> {
    load(config::File::with_name("config.toml").required(false))
}

/// Same as `load_config`, but the file at `path` must exist.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    load(config::File::from(path).required(true))
}

fn load<S>(file: S) -> Result<Config, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("COHORT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
