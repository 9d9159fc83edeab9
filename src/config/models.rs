use super::validation::{parse_or, seconds_or};
use super::{
    ConfigError, Settings, WORKER_JOIN_TIMEOUT_KEY, WORKER_THREADS_KEY, WORKER_TIMEOUT_KEY,
};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Number of worker threads
    pub threads: usize,
    /// Sleep between two polls of the queue
    pub poll_interval: Duration,
    /// Upper bound on waiting for each worker during stop
    pub join_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            poll_interval: default_poll_interval(),
            join_timeout: default_join_timeout(),
        }
    }
}

fn default_threads() -> usize {
    1
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_join_timeout() -> Duration {
    Duration::from_secs(60)
}

impl WorkerSettings {
    /// Read `worker.*` keys, applying defaults for absent ones
    pub fn from_settings(settings: &dyn Settings) -> Result<Self, ConfigError> {
        let threads = parse_or(settings, WORKER_THREADS_KEY, default_threads())?;
        if threads == 0 {
            return Err(ConfigError::Invalid {
                key: WORKER_THREADS_KEY.to_string(),
                value: threads.to_string(),
                reason: "at least one worker thread is required".to_string(),
            });
        }

        Ok(Self {
            threads,
            poll_interval: seconds_or(settings, WORKER_TIMEOUT_KEY, default_poll_interval())?,
            join_timeout: seconds_or(settings, WORKER_JOIN_TIMEOUT_KEY, default_join_timeout())?,
        })
    }
}
