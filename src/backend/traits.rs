use thiserror::Error;

use crate::config::ConfigError;
use crate::queue::Task;
use crate::storage::StorageError;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend '{0}' is closed")]
    Closed(String),
    #[error("cannot connect backend '{identifier}': {reason}")]
    Connect { identifier: String, reason: String },
    #[error("backend configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("transfer failed: {0}")]
    Transfer(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Remote store that uploads tasks
///
/// One handle is shared by every worker of a pool, so `transfer` must be safe
/// to call concurrently. `open` must succeed before the first `transfer`;
/// transferring on a closed handle fails with [`BackendError::Closed`].
pub trait Backend: Send + Sync {
    /// Name used for registry lookup
    fn identifier(&self) -> &str;

    /// Establish the connection, replacing any existing one
    fn open(&self) -> Result<()>;

    /// Release the connection; no-op when already closed
    fn close(&self);

    /// Upload `task.source_path()` to `task.bucket()` / `task.key()`
    fn transfer(&self, task: &Task) -> Result<()>;
}
