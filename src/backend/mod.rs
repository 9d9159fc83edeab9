//! Pluggable upload backends
//!
//! ## Key Components
//!
//! - [`Backend`] - Capability trait for anything that can upload a [`Task`](crate::queue::Task)
//! - [`ObjectStoreBackend`] - S3, local filesystem and in-memory stores via `object_store`
//! - [`BackendRegistry`] - Selects and opens one backend by the `files.provider` key
//!
//! ## Example
//!
//! ```rust,ignore
//! use bucketeer::backend::BackendRegistry;
//!
//! let registry = BackendRegistry::with_defaults(settings.clone());
//! let backend = registry.build()?;
//! backend.transfer(&task)?;
//! ```

mod remote;
mod registry;
mod traits;

pub use remote::{ObjectStoreBackend, StoreKind};
pub use registry::{BackendRegistry, RegistryError};
pub use traits::{Backend, BackendError, Result};
