use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::remote::{ObjectStoreBackend, StoreKind};
use super::traits::{Backend, BackendError};
use crate::config::{PROVIDER_KEY, Settings};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no backend configured ('files.provider' is not set)")]
    MissingProvider,
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
    #[error("failed to open backend: {0}")]
    Open(#[from] BackendError),
}

/// Registry mapping backend identifiers to backend instances
#[derive(Clone)]
pub struct BackendRegistry {
    settings: Arc<dyn Settings>,
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new(settings: Arc<dyn Settings>) -> Self {
        Self {
            settings,
            backends: BTreeMap::new(),
        }
    }

    /// Register under the backend's own identifier, replacing any previous entry
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends
            .insert(backend.identifier().to_string(), backend);
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(identifier).cloned()
    }

    pub fn has_backend(&self, identifier: &str) -> bool {
        self.backends.contains_key(identifier)
    }

    /// Open and return the backend named by `files.provider`
    ///
    /// Nothing is opened when the name is unknown.
    pub fn build(&self) -> Result<Arc<dyn Backend>, RegistryError> {
        let provider = self
            .settings
            .get(PROVIDER_KEY)
            .filter(|p| !p.is_empty())
            .ok_or(RegistryError::MissingProvider)?;

        let backend = self
            .get(&provider)
            .ok_or_else(|| RegistryError::UnsupportedBackend(provider.clone()))?;

        backend.open()?;
        info!(backend = %provider, "Backend selected");

        Ok(backend)
    }

    /// Create registry with the built-in object store backends
    pub fn with_defaults(settings: Arc<dyn Settings>) -> Self {
        let mut registry = Self::new(settings.clone());

        for kind in [StoreKind::S3, StoreKind::Local, StoreKind::Memory] {
            registry.register(Arc::new(ObjectStoreBackend::new(kind, settings.clone())));
        }

        registry
    }
}
