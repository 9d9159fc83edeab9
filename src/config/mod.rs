//! Configuration management for Bucketeer
//!
//! Everything downstream reads configuration through the [`Settings`] trait, a
//! flat lookup of dotted string keys (`files.upload.bucket`, `worker.threads`).
//! [`PropertiesConfig`] is the in-memory implementation; it can be filled by hand
//! or loaded from layered sources:
//! 1. TOML configuration file (nested tables flatten to dotted keys)
//! 2. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use bucketeer::config::{PropertiesConfig, Settings};
//!
//! let config = PropertiesConfig::load().expect("Failed to load configuration");
//! println!("Provider: {:?}", config.get("files.provider"));
//! ```
//!
//! # Environment Variables
//!
//! Keys can be overridden using environment variables with the pattern
//! `BUCKETEER__<section>__<key>`:
//! - `BUCKETEER__WORKER__THREADS=8` -> `worker.threads`
//! - `BUCKETEER__FILES__PROVIDER=s3` -> `files.provider`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/bucketeer.toml`.
//! This can be overridden using the `BUCKETEER_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::WorkerSettings;
pub use validation::{parse_or, require, seconds_or};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

/// Backend identifier consulted by the registry.
pub const PROVIDER_KEY: &str = "files.provider";
pub const WORKER_THREADS_KEY: &str = "worker.threads";
pub const WORKER_TIMEOUT_KEY: &str = "worker.timeout";
pub const WORKER_JOIN_TIMEOUT_KEY: &str = "worker.join.timeout";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration key '{0}'")]
    Missing(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Key/value configuration capability shared by tasks, backends and the pool.
pub trait Settings: Send + Sync {
    /// Look up a key; `None` when it was never set.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a key, replacing any previous value.
    fn put(&self, key: &str, value: &str);
}

/// In-memory properties map
#[derive(Debug, Default)]
pub struct PropertiesConfig {
    entries: RwLock<BTreeMap<String, String>>,
}

impl PropertiesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        let config = Self::new();
        for (key, value) in properties {
            config.put(&key.to_string(), &value.to_string());
        }
        config
    }

    /// Load from the default file location plus environment overrides
    pub fn load() -> Result<Self> {
        let entries = sources::load()?;
        Ok(Self::from_properties(entries))
    }

    /// Load from a specific file plus environment overrides
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from_path(path: PathBuf) -> Result<Self> {
        let entries = sources::load_from_sources(path)?;
        Ok(Self::from_properties(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Settings for PropertiesConfig {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn put(&self, key: &str, value: &str) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.to_string(), value.to_string());
    }
}
