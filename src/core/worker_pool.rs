//! Bounded worker-thread pools.
//!
//! A `WorkerPool` runs fire-and-forget closures on named OS threads fed by a
//! bounded queue. Pools back the parallel entity phase and any work that must
//! stay off the heartbeat thread (persistence, connection acceptance).
//!
//! # Key Features
//!
//! - **Named threads**: `{pool}-worker-{n}`, so stack dumps show who is stuck
//! - **Idle timeout**: idle workers exit and are recreated on demand
//! - **Rejection policy**: run on the caller with a warning, or fail loudly
//! - **Lossless shutdown**: accepted tasks are drained before workers exit
//!
//! # Example
//!
//! ```rust
//! use tick_engine::config::WorkerPoolConfig;
//! use tick_engine::core::WorkerPool;
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_name("io")
//!         .with_worker_count(2)
//!         .with_max_queue_depth(64),
//! )?;
//! pool.execute(|| {
//!     // write a player file
//! })?;
//! pool.shutdown();
//! # Ok::<(), tick_engine::core::PoolError>(())
//! ```

mod native;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ThreadPriority;

pub use native::WorkerPool;

/// Why a pool refused a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The pool has been shut down.
    ShutDown,
    /// The bounded queue is full.
    QueueFull,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutDown => write!(f, "pool not running"),
            Self::QueueFull => write!(f, "no space in work queue"),
        }
    }
}

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool refused the task under the strict rejection policy.
    Rejected {
        /// Name of the pool.
        pool: String,
        /// Why the task was refused.
        reason: RejectionReason,
    },

    /// No pool with this name is registered.
    UnknownPool(String),

    /// Configuration validation failed.
    InvalidConfig(String),

    /// A worker thread could not be started.
    Spawn {
        /// Name of the pool.
        pool: String,
        /// OS error message.
        message: String,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { pool, reason } => {
                write!(f, "task rejected by pool `{pool}`: {reason}")
            }
            Self::UnknownPool(name) => write!(f, "no pool named `{name}`"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Spawn { pool, message } => {
                write!(f, "failed to spawn worker for pool `{pool}`: {message}")
            }
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pool name.
    pub name: String,
    /// Configured maximum number of workers.
    pub worker_count: usize,
    /// Advisory thread priority.
    pub advisory_priority: ThreadPriority,
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Live workers waiting for a task.
    pub idle_workers: usize,
    /// Tasks executing right now.
    pub active_tasks: u64,
    /// Tasks waiting in the queue.
    pub queued_tasks: u64,
    /// Tasks accepted into the queue.
    pub submitted_tasks: u64,
    /// Tasks that finished without panicking.
    pub completed_tasks: u64,
    /// Tasks that panicked.
    pub failed_tasks: u64,
    /// Tasks run on the submitting thread after a rejection.
    pub caller_runs: u64,
    /// Tasks refused with an error.
    pub rejected_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub caller_runs: AtomicU64,
    pub rejected_tasks: AtomicU64,
}

impl PoolCounters {
    /// Copy the counters into `stats`.
    pub fn fill(&self, stats: &mut PoolStats) {
        stats.active_tasks = self.active_tasks.load(Ordering::Relaxed);
        stats.queued_tasks = self.queued_tasks.load(Ordering::Relaxed);
        stats.submitted_tasks = self.submitted_tasks.load(Ordering::Relaxed);
        stats.completed_tasks = self.completed_tasks.load(Ordering::Relaxed);
        stats.failed_tasks = self.failed_tasks.load(Ordering::Relaxed);
        stats.caller_runs = self.caller_runs.load(Ordering::Relaxed);
        stats.rejected_tasks = self.rejected_tasks.load(Ordering::Relaxed);
    }
}
