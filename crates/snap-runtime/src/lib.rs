//! Shared-memory task runtime for snap.
//!
//! Provides the [`Runtime`] that owns arrays, derives execution order from
//! the region requirements of each launch, and runs point tasks on a pool
//! of worker threads. Launches return a [`TaskFuture`](snap_task::TaskFuture)
//! immediately; launches whose requirements do not conflict run
//! concurrently.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod runtime;
mod scheduler;
mod store;
mod worker;

pub use config::{ConfigError, RuntimeConfig};
pub use metrics::RuntimeMetrics;
pub use runtime::{Runtime, RuntimeHandle, ShutdownReport};
pub use scheduler::DependencyRecord;
