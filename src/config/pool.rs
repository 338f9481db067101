//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a pool does with a task it cannot accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Best effort: run the task on the submitting thread and log a warning.
    CallerRuns,
    /// Strict: return a rejection error naming the pool and the reason.
    #[default]
    Abort,
}

/// Scheduling priority requested for a pool's threads.
///
/// The standard library cannot change OS thread priority, so this is
/// advisory: it is reported in logs and stats for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    /// Background work such as persistence.
    Low,
    /// Regular work.
    #[default]
    Normal,
    /// Latency-sensitive work such as the entity update phase.
    High,
}

/// Configuration for a [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Pool name, used in thread names, logs and errors.
    pub name: String,
    /// Maximum number of worker threads.
    pub worker_count: usize,
    /// Maximum queued tasks before the rejection policy applies.
    pub max_queue_depth: usize,
    /// Requested thread priority. Reported in logs and stats only; OS
    /// threads keep their default priority.
    #[serde(default)]
    pub advisory_priority: ThreadPriority,
    /// Idle time after which a worker exits; `None` keeps workers forever.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    /// Start every worker at construction instead of on demand.
    #[serde(default)]
    pub prestart: bool,
    /// Behaviour when a task cannot be queued.
    #[serde(default)]
    pub rejection: RejectionPolicy,
    /// Stack size of each worker thread in bytes.
    #[serde(default = "default_stack_size")]
    pub thread_stack_size: usize,
}

const fn default_stack_size() -> usize {
    2 * 1024 * 1024
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            worker_count: num_cpus::get(),
            max_queue_depth: 1024,
            advisory_priority: ThreadPriority::Normal,
            idle_timeout_ms: None,
            prestart: false,
            rejection: RejectionPolicy::Abort,
            thread_stack_size: default_stack_size(),
        }
    }
}

impl WorkerPoolConfig {
    /// Defaults: one worker per CPU, 1024 queued tasks, strict rejection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue bound.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Set the advisory thread priority.
    #[must_use]
    pub const fn with_advisory_priority(mut self, priority: ThreadPriority) -> Self {
        self.advisory_priority = priority;
        self
    }

    /// Let idle workers exit after `timeout`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Let idle workers exit after `minutes` minutes.
    #[must_use]
    pub const fn with_idle_timeout_minutes(mut self, minutes: u64) -> Self {
        self.idle_timeout_ms = Some(minutes * 60_000);
        self
    }

    /// Start every worker up front.
    #[must_use]
    pub const fn with_prestart(mut self, prestart: bool) -> Self {
        self.prestart = prestart;
        self
    }

    /// Set the rejection policy.
    #[must_use]
    pub const fn with_rejection(mut self, rejection: RejectionPolicy) -> Self {
        self.rejection = rejection;
        self
    }

    /// Set the worker stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Idle timeout as a duration.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.idle_timeout_ms == Some(0) {
            return Err("idle_timeout_ms must be greater than 0 when set".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}
