use super::Settings;
use config::{ConfigError, Environment, File, Map};
use std::env;
use std::path::PathBuf;

pub const CONFIG_ENV_VAR: &str = "DEPOSIT_RECON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/deposit-recon.toml";
const ENV_PREFIX: &str = "DEPOSIT_RECON";
const ENV_SEPARATOR: &str = "__";

/// Load settings from the file named by `DEPOSIT_RECON_CONFIG` (or the
/// default path) plus the environment.
pub fn load() -> Result<Settings, ConfigError> {
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load settings from a specific file plus the environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Settings, ConfigError> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    layered(config_path, None)
}

/// Stack the file under the `DEPOSIT_RECON__*` variables, read from `env`
/// when given instead of the process environment.
fn layered(
    config_path: PathBuf,
    env: Option<Map<String, String>>,
) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // DEPOSIT_RECON__INGEST__MAX_PAGES -> ingest.max_pages
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env),
    );

    builder.build()?.try_deserialize()
}
