use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::traits::{Backend, BackendError, Result};
use crate::config::{Settings, require};
use crate::queue::Task;
use crate::storage::BucketClient;

const DEFAULT_REGION: &str = "us-east-1";
const IO_THREADS: usize = 2;

/// Which object store flavour a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// S3 or any S3-compatible endpoint (MinIO, Wasabi)
    S3,
    /// Directory tree under `files.local.root`, one subdirectory per bucket
    Local,
    /// Process memory; contents are dropped on close
    Memory,
}

impl StoreKind {
    pub fn identifier(&self) -> &'static str {
        match self {
            StoreKind::S3 => "s3",
            StoreKind::Local => "local",
            StoreKind::Memory => "memory",
        }
    }
}

/// Connection parameters captured at `open` time
#[derive(Debug, Clone)]
enum Endpoint {
    S3 {
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        endpoint_url: Option<String>,
        region: String,
    },
    Local {
        root: PathBuf,
    },
    Memory,
}

impl Endpoint {
    fn from_settings(kind: StoreKind, settings: &dyn Settings) -> Result<Self> {
        Ok(match kind {
            StoreKind::S3 => Endpoint::S3 {
                access_key_id: settings.get("aws_access_key_id"),
                secret_access_key: settings.get("aws_secret_access_key"),
                endpoint_url: settings.get("endpoint_url"),
                region: settings
                    .get("aws_region")
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            },
            StoreKind::Local => Endpoint::Local {
                root: PathBuf::from(require(settings, "files.local.root")?),
            },
            StoreKind::Memory => Endpoint::Memory,
        })
    }

    fn connect(&self, bucket: &str) -> std::result::Result<Arc<dyn ObjectStore>, String> {
        match self {
            Endpoint::S3 {
                access_key_id,
                secret_access_key,
                endpoint_url,
                region,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(region);

                if let Some(key) = access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(url) = endpoint_url {
                    builder = builder
                        .with_endpoint(url)
                        .with_allow_http(url.starts_with("http://"));
                }

                let store = builder.build().map_err(|e| e.to_string())?;
                Ok(Arc::new(store))
            }
            Endpoint::Local { root } => {
                let dir = root.join(bucket);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
                let store = LocalFileSystem::new_with_prefix(&dir).map_err(|e| e.to_string())?;
                Ok(Arc::new(store))
            }
            Endpoint::Memory => Ok(Arc::new(InMemory::new())),
        }
    }
}

/// One open connection: a private runtime plus a client per bucket
struct Session {
    runtime: Option<Runtime>,
    endpoint: Endpoint,
    clients: Mutex<HashMap<String, BucketClient>>,
}

impl Session {
    fn start(identifier: &str, endpoint: Endpoint) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(IO_THREADS)
            .thread_name(format!("{identifier}-io"))
            .enable_all()
            .build()
            .map_err(|e| BackendError::Connect {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            runtime: Some(runtime),
            endpoint,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn runtime(&self, identifier: &str) -> Result<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| BackendError::Closed(identifier.to_string()))
    }

    /// Bucket clients are created lazily and reused for the session
    fn client(&self, identifier: &str, bucket: &str) -> Result<BucketClient> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = clients.get(bucket) {
            return Ok(client.clone());
        }

        let store = self
            .endpoint
            .connect(bucket)
            .map_err(|reason| BackendError::Connect {
                identifier: identifier.to_string(),
                reason,
            })?;
        let client = BucketClient::new(store, bucket);
        clients.insert(bucket.to_string(), client.clone());
        debug!(backend = identifier, bucket, "Bucket client created");

        Ok(client)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; background shutdown does not
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Backend uploading through the `object_store` crate
///
/// `transfer` blocks the calling thread on the session's runtime, so it must be
/// called from plain threads, never from inside an async task.
pub struct ObjectStoreBackend {
    kind: StoreKind,
    settings: Arc<dyn Settings>,
    session: RwLock<Option<Arc<Session>>>,
}

impl ObjectStoreBackend {
    pub fn new(kind: StoreKind, settings: Arc<dyn Settings>) -> Self {
        Self {
            kind,
            settings,
            session: RwLock::new(None),
        }
    }

    pub fn s3(settings: Arc<dyn Settings>) -> Self {
        Self::new(StoreKind::S3, settings)
    }

    pub fn local(settings: Arc<dyn Settings>) -> Self {
        Self::new(StoreKind::Local, settings)
    }

    pub fn memory(settings: Arc<dyn Settings>) -> Self {
        Self::new(StoreKind::Memory, settings)
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.current().is_some()
    }

    /// Read an object back
    pub fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let session = self.session()?;
        let client = session.client(self.identifier(), bucket)?;
        let bytes = session
            .runtime(self.identifier())?
            .block_on(client.download(key))?;
        Ok(bytes)
    }

    /// Check whether an object exists
    pub fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let session = self.session()?;
        let client = session.client(self.identifier(), bucket)?;
        let found = session
            .runtime(self.identifier())?
            .block_on(client.exists(key))?;
        Ok(found)
    }

    fn current(&self) -> Option<Arc<Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.current()
            .ok_or_else(|| BackendError::Closed(self.identifier().to_string()))
    }
}

impl Backend for ObjectStoreBackend {
    fn identifier(&self) -> &str {
        self.kind.identifier()
    }

    fn open(&self) -> Result<()> {
        self.close();

        let endpoint = Endpoint::from_settings(self.kind, self.settings.as_ref())?;
        let session = Session::start(self.identifier(), endpoint)?;

        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
        info!(backend = self.identifier(), "Backend opened");

        Ok(())
    }

    fn close(&self) {
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // In-flight transfers keep their own reference; the runtime goes away
        // with the last one
        if previous.is_some() {
            info!(backend = self.identifier(), "Backend closed");
        }
    }

    fn transfer(&self, task: &Task) -> Result<()> {
        let session = self.session()?;
        let client = session.client(self.identifier(), task.bucket())?;

        session
            .runtime(self.identifier())?
            .block_on(client.upload_file(task.source_path(), task.key()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, PropertiesConfig};
    use crate::storage::StorageError;
    use std::fs;
    use tempfile::TempDir;

    fn settings(extra: &[(&str, &str)]) -> Arc<dyn Settings> {
        let config = PropertiesConfig::from_properties([
            ("files.upload.bucket", "bom"),
            ("files.upload.key", "upload/"),
        ]);
        for (key, value) in extra {
            config.put(key, value);
        }
        Arc::new(config)
    }

    fn write_source(dir: &TempDir, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_transfer_requires_open() {
        let settings = settings(&[]);
        let backend = ObjectStoreBackend::memory(settings.clone());
        let task = Task::new(settings.as_ref(), "/tmp/x.dat", "upload", "x.dat").unwrap();

        let result = backend.transfer(&task);
        assert!(matches!(result, Err(BackendError::Closed(id)) if id == "memory"));
    }

    #[test]
    fn test_memory_transfer() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_source(&temp_dir, "x.dat", b"carne asada");
        let settings = settings(&[]);
        let backend = ObjectStoreBackend::memory(settings.clone());
        backend.open().unwrap();

        let task = Task::new(settings.as_ref(), &source, "upload", "x.dat").unwrap();
        backend.transfer(&task).unwrap();

        assert!(backend.exists("bom", "upload/x.dat").unwrap());
        assert_eq!(backend.download("bom", "upload/x.dat").unwrap(), b"carne asada");
        assert!(!backend.exists("other", "upload/x.dat").unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = ObjectStoreBackend::memory(settings(&[]));
        backend.close();
        backend.open().unwrap();
        assert!(backend.is_open());

        backend.close();
        backend.close();
        assert!(!backend.is_open());
    }

    #[test]
    fn test_reopen_starts_fresh_session() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_source(&temp_dir, "x.dat", b"data");
        let settings = settings(&[]);
        let backend = ObjectStoreBackend::memory(settings.clone());
        backend.open().unwrap();

        let task = Task::new(settings.as_ref(), &source, "upload", "x.dat").unwrap();
        backend.transfer(&task).unwrap();
        backend.open().unwrap();

        assert!(!backend.exists("bom", "upload/x.dat").unwrap());
    }

    #[test]
    fn test_unreadable_source() {
        let settings = settings(&[]);
        let backend = ObjectStoreBackend::memory(settings.clone());
        backend.open().unwrap();

        let task = Task::new(settings.as_ref(), "/definitely/not/here.dat", "upload", "here.dat").unwrap();
        let result = backend.transfer(&task);
        assert!(matches!(
            result,
            Err(BackendError::Transfer(StorageError::SourceUnreadable { .. }))
        ));
    }

    #[test]
    fn test_local_transfer_writes_under_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        let source = write_source(&temp_dir, "x.dat", b"local bytes");
        let settings = settings(&[("files.local.root", root.to_str().unwrap())]);
        let backend = ObjectStoreBackend::local(settings.clone());
        backend.open().unwrap();

        let task = Task::new(settings.as_ref(), &source, "upload", "x.dat").unwrap();
        backend.transfer(&task).unwrap();

        let written = fs::read(root.join("bom").join("upload").join("x.dat")).unwrap();
        assert_eq!(written, b"local bytes");
    }

    #[test]
    fn test_local_requires_root() {
        let backend = ObjectStoreBackend::local(settings(&[]));

        let result = backend.open();
        assert!(matches!(
            result,
            Err(BackendError::Config(ConfigError::Missing(key))) if key == "files.local.root"
        ));
        assert!(!backend.is_open());
    }

    #[test]
    fn test_concurrent_transfers_share_handle() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&[]);
        let backend = Arc::new(ObjectStoreBackend::memory(settings.clone()));
        backend.open().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let name = format!("{i}.dat");
                let source = write_source(&temp_dir, &name, name.as_bytes());
                let task = Task::new(settings.as_ref(), source, "upload", &name).unwrap();
                let backend = backend.clone();
                std::thread::spawn(move || backend.transfer(&task))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        for i in 0..4 {
            let body = backend.download("bom", &format!("upload/{i}.dat")).unwrap();
            assert_eq!(body, format!("{i}.dat").into_bytes());
        }
    }
}
