use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::runner::Worker;
use super::signal::CancellationSignal;
use crate::backend::{Backend, BackendRegistry, RegistryError};
use crate::config::{ConfigError, Settings, WorkerSettings};
use crate::observability::Metrics;
use crate::queue::TaskQueue;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid worker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("backend selection failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("no prepared workers, call prepare() first")]
    NotPrepared,

    #[error("workers are already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// Outcome of a bounded stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopSummary {
    /// Workers that exited within the timeout
    pub joined: usize,
    /// Workers still running when their wait expired; they are left detached
    /// and stay tracked by the pool
    pub detached: usize,
}

struct RunningWorker {
    id: usize,
    handle: JoinHandle<()>,
    // Disconnects when the worker thread returns or unwinds
    exited: Receiver<()>,
}

/// Fixed-size set of worker threads sharing one queue, one signal and one backend
///
/// Lifecycle is `prepare` -> `start` -> `stop`. Raising the signal is left to
/// the caller; `stop` only waits.
pub struct Pool {
    settings: WorkerSettings,
    queue: Arc<TaskQueue>,
    signal: CancellationSignal,
    registry: BackendRegistry,
    metrics: Arc<Metrics>,
    backend: Option<Arc<dyn Backend>>,
    prepared: Vec<Worker>,
    running: Vec<RunningWorker>,
}

impl Pool {
    /// Create a pool, reading `worker.*` keys from `settings`
    pub fn new(
        settings: &dyn Settings,
        queue: Arc<TaskQueue>,
        signal: CancellationSignal,
        registry: BackendRegistry,
    ) -> Result<Self> {
        Ok(Self::with_worker_settings(
            WorkerSettings::from_settings(settings)?,
            queue,
            signal,
            registry,
        ))
    }

    pub fn with_worker_settings(
        settings: WorkerSettings,
        queue: Arc<TaskQueue>,
        signal: CancellationSignal,
        registry: BackendRegistry,
    ) -> Self {
        Self {
            settings,
            queue,
            signal,
            registry,
            metrics: Arc::new(Metrics::new()),
            backend: None,
            prepared: Vec::new(),
            running: Vec::new(),
        }
    }

    /// Build one backend and `threads` workers sharing it
    ///
    /// Any previously prepared workers are discarded.
    pub fn prepare(&mut self) -> Result<()> {
        if !self.running.is_empty() {
            return Err(PoolError::AlreadyRunning);
        }

        self.prepared.clear();
        let backend = self.registry.build()?;

        self.prepared = (0..self.settings.threads)
            .map(|id| {
                Worker::new(
                    id,
                    self.queue.clone(),
                    self.signal.clone(),
                    backend.clone(),
                    self.metrics.clone(),
                    self.settings.poll_interval,
                )
            })
            .collect();
        self.backend = Some(backend);

        info!(
            threads = self.settings.threads,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Pool prepared"
        );

        Ok(())
    }

    /// Launch every prepared worker on its own thread and return immediately
    pub fn start(&mut self) -> Result<()> {
        if !self.running.is_empty() {
            return Err(PoolError::AlreadyRunning);
        }
        if self.prepared.is_empty() || self.backend.is_none() {
            return Err(PoolError::NotPrepared);
        }

        for worker in self.prepared.drain(..) {
            let id = worker.id();
            let (exit_tx, exited) = mpsc::channel::<()>();

            let handle = thread::Builder::new()
                .name(format!("bucketeer-worker-{id}"))
                .spawn(move || {
                    let _exit = exit_tx;
                    worker.run();
                })?;

            self.running.push(RunningWorker { id, handle, exited });
        }

        info!(workers = self.running.len(), "Pool started");
        Ok(())
    }

    /// Wait for workers using the configured join timeout
    pub fn stop(&mut self) -> StopSummary {
        self.stop_with_timeout(self.settings.join_timeout)
    }

    /// Wait for each worker at most `timeout`
    ///
    /// Workers that miss the bound are detached, never killed, and waited on
    /// again by the next stop. The backend is closed only once every worker
    /// has exited. Prepared but unstarted workers are discarded.
    pub fn stop_with_timeout(&mut self, timeout: Duration) -> StopSummary {
        let mut summary = StopSummary::default();
        let mut still_running = Vec::new();

        self.prepared.clear();

        for worker in self.running.drain(..) {
            match worker.exited.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        warn!(worker = worker.id, "Worker thread panicked");
                    }
                    debug!(worker = worker.id, "Worker joined");
                    summary.joined += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        worker = worker.id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Worker did not stop in time, detaching"
                    );
                    summary.detached += 1;
                    still_running.push(worker);
                }
            }
        }
        self.running = still_running;

        if summary.detached == 0 {
            if let Some(backend) = self.backend.take() {
                backend.close();
            }
        } else {
            warn!(
                detached = summary.detached,
                "Leaving backend open for workers still running"
            );
        }

        let snapshot = self.metrics.snapshot();
        info!(
            joined = summary.joined,
            detached = summary.detached,
            transferred = snapshot.transfers_succeeded,
            failed = snapshot.transfers_failed,
            "Pool stopped"
        );

        summary
    }

    pub fn worker_settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Workers prepared or running
    pub fn worker_count(&self) -> usize {
        self.prepared.len() + self.running.len()
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::config::{PROVIDER_KEY, PropertiesConfig};
    use crate::queue::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct NullBackend {
        opens: AtomicUsize,
        closes: AtomicUsize,
    }

    impl Backend for NullBackend {
        fn identifier(&self) -> &str {
            "null"
        }

        fn open(&self) -> std::result::Result<(), BackendError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn transfer(&self, _task: &Task) -> std::result::Result<(), BackendError> {
            Ok(())
        }
    }

    fn create_pool(threads: &str, backend: Arc<NullBackend>) -> Pool {
        let config = Arc::new(PropertiesConfig::from_properties([
            (PROVIDER_KEY, "null"),
            ("worker.threads", threads),
            ("worker.timeout", "0.01"),
            ("worker.join.timeout", "5"),
        ]));
        let mut registry = BackendRegistry::new(config.clone());
        registry.register(backend);

        Pool::new(
            config.as_ref(),
            Arc::new(TaskQueue::new()),
            CancellationSignal::new(),
            registry,
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_shares_one_backend() {
        let backend = Arc::new(NullBackend::default());
        let mut pool = create_pool("4", backend.clone());

        pool.prepare().unwrap();
        assert_eq!(pool.worker_count(), 4);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prepare_replaces_workers() {
        let backend = Arc::new(NullBackend::default());
        let mut pool = create_pool("3", backend.clone());

        pool.prepare().unwrap();
        pool.prepare().unwrap();
        assert_eq!(pool.worker_count(), 3);
    }

    #[test]
    fn test_start_requires_prepare() {
        let mut pool = create_pool("2", Arc::new(NullBackend::default()));

        assert!(matches!(pool.start(), Err(PoolError::NotPrepared)));
    }

    #[test]
    fn test_start_stop_closes_backend_once() {
        let backend = Arc::new(NullBackend::default());
        let mut pool = create_pool("2", backend.clone());

        pool.prepare().unwrap();
        pool.start().unwrap();
        assert!(pool.is_running());
        assert!(matches!(pool.start(), Err(PoolError::AlreadyRunning)));

        pool.signal().cancel();
        let summary = pool.stop();

        assert_eq!(summary, StopSummary { joined: 2, detached: 0 });
        assert!(!pool.is_running());
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);

        pool.stop();
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_after_stop_without_start_fails() {
        let backend = Arc::new(NullBackend::default());
        let mut pool = create_pool("2", backend.clone());

        pool.prepare().unwrap();
        let summary = pool.stop();

        assert_eq!(summary, StopSummary::default());
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
        assert_eq!(pool.worker_count(), 0);
        assert!(matches!(pool.start(), Err(PoolError::NotPrepared)));

        pool.prepare().unwrap();
        pool.start().unwrap();
        pool.signal().cancel();
        assert_eq!(pool.stop().joined, 2);
    }

    #[test]
    fn test_invalid_threads() {
        let config = PropertiesConfig::from_properties([("worker.threads", "zero")]);
        let registry = BackendRegistry::new(Arc::new(PropertiesConfig::new()));

        let result = Pool::new(
            &config,
            Arc::new(TaskQueue::new()),
            CancellationSignal::new(),
            registry,
        );
        assert!(matches!(result, Err(PoolError::Config(_))));
    }

    #[test]
    fn test_unsupported_backend_fails_prepare() {
        let config = Arc::new(PropertiesConfig::from_properties([(PROVIDER_KEY, "ftp")]));
        let registry = BackendRegistry::new(config.clone());
        let mut pool = Pool::new(
            config.as_ref(),
            Arc::new(TaskQueue::new()),
            CancellationSignal::new(),
            registry,
        )
        .unwrap();

        let result = pool.prepare();
        assert!(matches!(
            result,
            Err(PoolError::Registry(RegistryError::UnsupportedBackend(_)))
        ));
        assert_eq!(pool.worker_count(), 0);
    }
}
