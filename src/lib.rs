pub mod backoff;
pub mod config;
pub mod history;
pub mod monitor;
pub mod notify;
pub mod pattern;
pub mod signal;
pub mod snapshot;
pub mod source;
pub mod trend;
