use crate::config::{ConfigError, Settings, require};
use std::path::{Path, PathBuf};

/// One file to upload, with its destination resolved from configuration
///
/// The destination is looked up once, at construction, from
/// `files.<category>.bucket` and `files.<category>.key`. The key setting is
/// an optional prefix prepended verbatim to the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    source_path: PathBuf,
    category: String,
    bucket: String,
    key: String,
}

impl Task {
    pub fn new(
        settings: &dyn Settings,
        source_path: impl Into<PathBuf>,
        category: impl Into<String>,
        filename: &str,
    ) -> Result<Self, ConfigError> {
        let category = category.into();

        let bucket = require(settings, &format!("files.{category}.bucket"))?;
        let key = match settings.get(&format!("files.{category}.key")) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}{filename}"),
            _ => filename.to_string(),
        };

        Ok(Self {
            source_path: source_path.into(),
            category,
            bucket,
            key,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}
