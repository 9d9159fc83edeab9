pub mod backend;
pub mod config;
pub mod observability;
pub mod queue;
pub mod storage;
pub mod worker;
