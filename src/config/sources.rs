use super::ConfigError;
use config::{Environment, File, Map, Source, Value};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "BUCKETEER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/bucketeer.toml";
const ENV_PREFIX: &str = "BUCKETEER";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. TOML file (if exists)
/// 2. Environment variables from .env file (via dotenvy)
/// 3. System environment variables (highest priority)
pub fn load() -> Result<BTreeMap<String, String>, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Credentials can come from the usual AWS variables when the file and the
/// prefixed environment leave them unset
fn load_secrets(entries: &mut BTreeMap<String, String>) {
    for (key, var) in [
        ("aws_access_key_id", "AWS_ACCESS_KEY_ID"),
        ("aws_secret_access_key", "AWS_SECRET_ACCESS_KEY"),
    ] {
        if entries.contains_key(key) {
            continue;
        }
        if let Ok(value) = env::var(var) {
            entries.insert(key.to_string(), value);
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<BTreeMap<String, String>, ConfigError> {
    load_layers(config_path, None)
}

/// `env` replaces the process environment when given
fn load_layers(
    config_path: PathBuf,
    env: Option<Map<String, String>>,
) -> Result<BTreeMap<String, String>, ConfigError> {
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

    // BUCKETEER__WORKER__THREADS -> worker.threads
    // Values stay strings: "0012" must not become 12
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .source(env),
    );

    let config = builder.build()?;

    let mut entries = BTreeMap::new();
    flatten(None, config.collect()?, &mut entries);
    load_secrets(&mut entries);

    Ok(entries)
}

/// Turn nested tables into dotted keys
fn flatten(prefix: Option<&str>, table: Map<String, Value>, out: &mut BTreeMap<String, String>) {
    for (name, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name,
        };

        match value.clone().into_table() {
            Ok(nested) => flatten(Some(&key), nested, out),
            Err(_) => match value.into_string() {
                Ok(scalar) => {
                    out.insert(key, scalar);
                }
                Err(e) => tracing::warn!(key, error = %e, "Skipping non-scalar configuration value"),
            },
        }
    }
}
