//! Upload worker pool
//!
//! A [`Pool`] owns a fixed number of OS threads. Each runs a [`Worker`] loop
//! that polls the shared [`TaskQueue`](crate::queue::TaskQueue), uploads through
//! the single backend the pool opened, and sleeps for the poll interval. All
//! workers watch the same [`CancellationSignal`].

mod pool;
mod runner;
mod signal;

pub use pool::{Pool, PoolError, StopSummary};
pub use runner::{Poll, Worker};
pub use signal::CancellationSignal;
