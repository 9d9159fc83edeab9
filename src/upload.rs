use bucketeer::backend::BackendRegistry;
use bucketeer::config::{PropertiesConfig, Settings};
use bucketeer::observability::Metrics;
use bucketeer::queue::{Task, TaskQueue};
use bucketeer::worker::{CancellationSignal, Pool};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cli::UploadArgs;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    category: Option<String>,
    name: Option<String>,
}

pub fn run(args: UploadArgs) -> Result<(), AnyError> {
    let settings: Arc<dyn Settings> = Arc::new(match &args.config {
        Some(path) => PropertiesConfig::load_from_path(path.clone())?,
        None => PropertiesConfig::load()?,
    });

    // Resolve every destination before any thread starts
    let tasks = collect_tasks(settings.as_ref(), &args)?;
    let total = tasks.len() as u64;

    let queue = Arc::new(TaskQueue::new());
    let signal = CancellationSignal::new();
    let registry = BackendRegistry::with_defaults(settings.clone());

    let mut pool = Pool::new(settings.as_ref(), queue.clone(), signal.clone(), registry)?;
    pool.prepare()?;
    pool.start()?;

    for task in tasks {
        queue.push(task);
    }
    info!(total, "Tasks enqueued");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(wait_for_drain(pool.metrics(), total));

    signal.cancel();
    let summary = pool.stop();

    let snapshot = pool.metrics().snapshot();
    info!(
        transferred = snapshot.transfers_succeeded,
        failed = snapshot.transfers_failed,
        pending = queue.len(),
        detached = summary.detached,
        "Upload finished"
    );

    Ok(())
}

fn collect_tasks(settings: &dyn Settings, args: &UploadArgs) -> Result<Vec<Task>, AnyError> {
    let mut tasks = Vec::new();

    for path in &args.files {
        let name = file_name(path)?;
        tasks.push(Task::new(settings, path, args.category.as_str(), &name)?);
    }

    if let Some(manifest) = &args.manifest {
        let raw = std::fs::read_to_string(manifest)?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&raw)?;

        for entry in entries {
            let name = match entry.name {
                Some(name) => name,
                None => file_name(&entry.path)?,
            };
            let category = entry.category.unwrap_or_else(|| args.category.clone());
            tasks.push(Task::new(settings, entry.path, category, &name)?);
        }
    }

    Ok(tasks)
}

fn file_name(path: &Path) -> Result<String, AnyError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("cannot derive a file name from {}", path.display()).into())
}

/// Resolve once every enqueued task has been dispatched, or on Ctrl+C/SIGTERM
async fn wait_for_drain(metrics: Arc<Metrics>, total: u64) {
    let drained = async {
        while metrics.snapshot().dispatched() < total {
            tokio::time::sleep(DRAIN_CHECK_INTERVAL).await;
        }
        info!("Queue drained");
    };

    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = drained => {},
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("Shutdown signal received"),
    }
}
