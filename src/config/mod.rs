//! Configuration management
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables, including a `.env` file
//!
//! Environment variables follow `DEPOSIT_RECON__<section>__<key>`, e.g.
//! `DEPOSIT_RECON__INGEST__MAX_PAGES=2` or `DEPOSIT_RECON__STORE__BACKEND=fjall`.
//!
//! Known addresses are a list of tables so that address case survives:
//!
//! ```toml
//! [[known_addresses]]
//! address = "mvd6qFeVkqH6MNAS2Y2cLifbdaX5XUkbZJ"
//! name = "Wesley Crusher"
//! ```

mod sources;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ingest::{IngestOptions, WriteFailurePolicy};
use crate::report::AddressRegistry;

pub use sources::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ingest.max_pages must be at least 1")]
    ZeroMaxPages,

    #[error("store.path must be set for the fjall backend")]
    MissingStorePath,

    #[error("known address #{0} is empty")]
    EmptyAddress(usize),

    #[error("known address '{0}' is listed twice")]
    DuplicateAddress(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub source: SourceSettings,
    pub ingest: IngestSettings,
    pub log: LogSettings,
    pub known_addresses: Vec<KnownAddress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Fjall,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("data/deposit-recon"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Directory holding the fixture pages.
    pub fixtures_dir: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("resources"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub max_pages: Option<usize>,
    pub on_write_error: WriteFailurePolicy,
}

impl From<&IngestSettings> for IngestOptions {
    fn from(settings: &IngestSettings) -> Self {
        IngestOptions {
            max_pages: settings.max_pages,
            on_write_error: settings.on_write_error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing-subscriber` filter directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownAddress {
    pub address: String,
    pub name: String,
}

impl Settings {
    /// Load from the default file location (or `DEPOSIT_RECON_CONFIG`) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = sources::load()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a specific file and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = sources::load_from_sources(path.as_ref().to_path_buf())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ingest.max_pages == Some(0) {
            return Err(ValidationError::ZeroMaxPages);
        }
        if self.store.backend == StoreBackend::Fjall && self.store.path.as_os_str().is_empty() {
            return Err(ValidationError::MissingStorePath);
        }

        let mut seen = HashSet::new();
        for (idx, known) in self.known_addresses.iter().enumerate() {
            if known.address.trim().is_empty() {
                return Err(ValidationError::EmptyAddress(idx + 1));
            }
            if !seen.insert(known.address.as_str()) {
                return Err(ValidationError::DuplicateAddress(known.address.clone()));
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> AddressRegistry {
        self.known_addresses
            .iter()
            .map(|known| (known.address.clone(), known.name.clone()))
            .collect()
    }
}
