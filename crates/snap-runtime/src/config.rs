//! Runtime configuration and startup error types.

use std::error::Error;
use std::fmt;

use snap_core::{RegistryError, VariantKind};

// ── RuntimeConfig ──────────────────────────────────────────────────

/// Configuration for [`Runtime`](crate::Runtime).
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Number of worker threads. `None` = auto-detect
    /// (`available_parallelism`, clamped to `[1, 64]`).
    pub worker_count: Option<usize>,
    /// Processor kind the workers execute. Every launched task kind needs
    /// a variant for it. Default: [`VariantKind::Cpu`].
    pub processor: VariantKind,
    /// Worker thread name prefix; workers are named `{prefix}-{index}`.
    /// Default: `"snap-worker"`.
    pub thread_name_prefix: String,
    /// Record the dependencies of every launch point for
    /// [`Runtime::dependency_trace`](crate::Runtime::dependency_trace).
    /// Default: false.
    pub trace_dependencies: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            processor: VariantKind::Cpu,
            thread_name_prefix: "snap-worker".to_string(),
            trace_dependencies: false,
        }
    }
}

impl RuntimeConfig {
    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, 64),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::InvalidWorkerCount { configured: 0 });
        }
        if self.processor != VariantKind::Cpu {
            return Err(ConfigError::UnsupportedProcessor {
                kind: self.processor,
            });
        }
        if self.thread_name_prefix.is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while building a runtime.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The task registry failed validation.
    Registry(RegistryError),
    /// `worker_count` was explicitly zero.
    InvalidWorkerCount {
        /// The configured value.
        configured: usize,
    },
    /// This runtime only executes CPU variants.
    UnsupportedProcessor {
        /// The requested processor kind.
        kind: VariantKind,
    },
    /// `thread_name_prefix` is empty.
    EmptyThreadName,
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::InvalidWorkerCount { configured } => {
                write!(f, "worker_count {configured} is below minimum of 1")
            }
            Self::UnsupportedProcessor { kind } => {
                write!(f, "processor kind {kind} is not supported")
            }
            Self::EmptyThreadName => write!(f, "thread_name_prefix must not be empty"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for ConfigError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}
