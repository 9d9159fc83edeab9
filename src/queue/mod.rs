//! Upload tasks and the shared queue workers drain

mod buffer;
mod task;

pub use buffer::TaskQueue;
pub use task::Task;
