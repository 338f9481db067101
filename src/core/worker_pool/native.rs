//! `WorkerPool` on OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on the channel; idle timeout uses `recv_timeout`
//! - **On-demand workers**: a submission starts a worker when none is idle
//! - **Clean shutdown**: dropping the sender lets workers drain and exit

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{RejectionPolicy, WorkerPoolConfig};
use crate::core::fault;

use super::{PoolCounters, PoolError, PoolStats, RejectionReason};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Live worker bookkeeping, guarded by one mutex so that spawning and idle
/// exit never race.
#[derive(Debug, Default)]
struct Workers {
    live: usize,
    next_id: usize,
    handles: Vec<JoinHandle<()>>,
}

/// State shared between the pool handle and its workers.
struct Shared {
    config: WorkerPoolConfig,
    task_rx: Receiver<Task>,
    counters: PoolCounters,
    /// Workers blocked waiting for a task.
    idle: AtomicUsize,
    workers: Mutex<Workers>,
}

/// Bounded pool of named worker threads.
///
/// Safe to submit to from any thread. Created once at startup and shut down
/// once with [`WorkerPool::shutdown`].
pub struct WorkerPool {
    shared: Arc<Shared>,

    /// Task sender (to workers). Option allows clean shutdown by dropping.
    task_tx: Mutex<Option<Sender<Task>>>,

    /// Shutdown flag (lock-free atomic).
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Create a pool. With `prestart`, every worker is started now; otherwise
    /// workers start as tasks arrive.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Spawn` if a prestarted worker cannot be created
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<Task>(config.max_queue_depth);
        let shared = Arc::new(Shared {
            config,
            task_rx,
            counters: PoolCounters::default(),
            idle: AtomicUsize::new(0),
            workers: Mutex::new(Workers::default()),
        });

        if shared.config.prestart {
            let mut workers = shared.workers.lock();
            for _ in 0..shared.config.worker_count {
                spawn_worker(&shared, &mut workers)?;
            }
        }

        info!(
            pool = %shared.config.name,
            worker_count = shared.config.worker_count,
            max_queue_depth = shared.config.max_queue_depth,
            advisory_priority = ?shared.config.advisory_priority,
            idle_timeout_ms = ?shared.config.idle_timeout_ms,
            prestart = shared.config.prestart,
            rejection = ?shared.config.rejection,
            "WorkerPool initialized"
        );

        Ok(Self {
            shared,
            task_tx: Mutex::new(Some(task_tx)),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Pool configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Whether the pool still accepts work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// Submit a task.
    ///
    /// The enqueue never blocks. When the queue is full or the pool is shut
    /// down the rejection policy decides: `CallerRuns` executes the task on
    /// this thread and logs a warning, `Abort` drops it and returns an error.
    ///
    /// # Errors
    ///
    /// `PoolError::Rejected` under `RejectionPolicy::Abort`.
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(task);
        let rejected = if self.shutdown.load(Ordering::Acquire) {
            Some((task, RejectionReason::ShutDown))
        } else {
            let task_tx = self.task_tx.lock();
            match task_tx.as_ref() {
                None => Some((task, RejectionReason::ShutDown)),
                Some(tx) => {
                    self.shared.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
                    match tx.try_send(task) {
                        Ok(()) => {
                            self.shared.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                            None
                        }
                        Err(TrySendError::Full(task)) => {
                            self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                            Some((task, RejectionReason::QueueFull))
                        }
                        Err(TrySendError::Disconnected(task)) => {
                            self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                            Some((task, RejectionReason::ShutDown))
                        }
                    }
                }
            }
        };

        match rejected {
            None => {
                ensure_worker(&self.shared);
                Ok(())
            }
            Some((task, reason)) => self.reject(task, reason),
        }
    }

    fn reject(&self, task: Task, reason: RejectionReason) -> Result<(), PoolError> {
        let pool = &self.shared.config.name;
        match self.shared.config.rejection {
            RejectionPolicy::CallerRuns => {
                warn!(pool = %pool, %reason, "task rejected; running on caller thread");
                self.shared.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
                run_task(&self.shared, task);
                Ok(())
            }
            RejectionPolicy::Abort => {
                warn!(pool = %pool, %reason, "task rejected");
                self.shared.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Rejected {
                    pool: pool.clone(),
                    reason,
                })
            }
        }
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let live_workers = self.shared.workers.lock().live;
        let mut stats = PoolStats {
            name: self.shared.config.name.clone(),
            worker_count: self.shared.config.worker_count,
            advisory_priority: self.shared.config.advisory_priority,
            live_workers,
            idle_workers: self.shared.idle.load(Ordering::Relaxed),
            ..PoolStats::default()
        };
        self.shared.counters.fill(&mut stats);
        stats
    }

    /// Stop accepting work, run every task already accepted, and join the
    /// workers. Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(pool = %self.shared.config.name, "Shutting down worker pool");

        // Drop the sender; workers drain the queue, then see the disconnect
        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }

        let handles = {
            let mut workers = self.shared.workers.lock();
            if workers.live == 0 && !self.shared.task_rx.is_empty() {
                if let Err(e) = spawn_worker(&self.shared, &mut workers) {
                    error!(pool = %self.shared.config.name, error = %e, "no worker to drain queue");
                }
            }
            std::mem::take(&mut workers.handles)
        };

        let worker_count = handles.len();
        for (idx, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                warn!(pool = %self.shared.config.name, worker_id = idx, "Worker panicked");
            }
        }

        info!(
            pool = %self.shared.config.name,
            worker_count,
            completed = self.shared.counters.completed_tasks.load(Ordering::Relaxed),
            "Worker pool shut down complete"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join; the sender drops with `self` and the
        // workers drain the queue on their own.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            debug!(
                pool = %self.shared.config.name,
                "WorkerPool dropped without explicit shutdown - workers will be detached"
            );
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Start a worker if the pool has room and nobody is idle to take the task.
fn ensure_worker(shared: &Arc<Shared>) {
    let mut workers = shared.workers.lock();
    let idle = shared.idle.load(Ordering::SeqCst);
    if workers.live < shared.config.worker_count && (workers.live == 0 || idle == 0) {
        if let Err(e) = spawn_worker(shared, &mut workers) {
            error!(pool = %shared.config.name, error = %e, "Failed to spawn worker");
        }
    }
}

/// Spawn a worker thread. Caller holds the `workers` lock.
fn spawn_worker(shared: &Arc<Shared>, workers: &mut Workers) -> Result<(), PoolError> {
    workers.handles.retain(|handle| !handle.is_finished());

    let worker_id = workers.next_id;
    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("{}-worker-{worker_id}", shared.config.name))
        .stack_size(shared.config.thread_stack_size)
        .spawn(move || worker_loop(&worker_shared, worker_id))
        .map_err(|e| PoolError::Spawn {
            pool: shared.config.name.clone(),
            message: e.to_string(),
        })?;

    workers.next_id += 1;
    workers.live += 1;
    workers.handles.push(handle);
    debug!(pool = %shared.config.name, worker_id, live = workers.live, "Worker started");
    Ok(())
}

fn worker_loop(shared: &Shared, worker_id: usize) {
    let idle_timeout = shared.config.idle_timeout();
    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let received = match idle_timeout {
            Some(timeout) => shared.task_rx.recv_timeout(timeout),
            None => shared
                .task_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        match received {
            Ok(task) => {
                shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                run_task(shared, task);
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut workers = shared.workers.lock();
                // A task may have landed after the timeout fired
                if !shared.task_rx.is_empty() {
                    continue;
                }
                workers.live -= 1;
                debug!(pool = %shared.config.name, worker_id, "Worker idle timeout, exiting");
                return;
            }
            Err(RecvTimeoutError::Disconnected) => {
                shared.workers.lock().live -= 1;
                debug!(pool = %shared.config.name, worker_id, "Worker channel closed, exiting");
                return;
            }
        }
    }
}

fn run_task(shared: &Shared, task: Task) {
    shared.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
    let outcome = fault::guard(|| {
        task();
        Ok(())
    });
    shared.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);

    match outcome {
        Ok(()) => {
            shared.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
        }
        Err(message) => {
            shared.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
            error!(pool = %shared.config.name, error = %message, "Task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::{Duration, Instant};

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_worker_pool_basic() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("basic")
                .with_worker_count(2)
                .with_max_queue_depth(10),
        )
        .unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        pool.execute(move || tx.send(41 + 1).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.shutdown();

        let stats = pool.stats();
        assert_eq!(stats.submitted_tasks, 1);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.live_workers, 0);
    }

    #[test]
    fn test_thread_names() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("persist")
                .with_worker_count(1),
        )
        .unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        pool.execute(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
        })
        .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("persist-worker-0"));
        pool.shutdown();
    }

    #[test]
    fn test_prestart_spawns_all_workers() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("prestart")
                .with_worker_count(3)
                .with_prestart(true),
        )
        .unwrap();

        assert_eq!(pool.stats().live_workers, 3);
        pool.shutdown();
    }

    #[test]
    fn test_lazy_start_without_prestart() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("lazy")
                .with_worker_count(3),
        )
        .unwrap();

        assert_eq!(pool.stats().live_workers, 0);
        pool.execute(|| {}).unwrap();
        assert!(pool.stats().live_workers >= 1);
        pool.shutdown();
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("panics")
                .with_worker_count(1)
                .with_prestart(true),
        )
        .unwrap();

        pool.execute(|| panic!("corrupt save file")).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.execute(move || tx.send(()).unwrap()).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        pool.shutdown();
        let stats = pool.stats();
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.completed_tasks, 1);
    }

    #[test]
    fn test_shutdown_drains_accepted_tasks() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("drain")
                .with_worker_count(1)
                .with_max_queue_depth(64),
        )
        .unwrap();

        let done = Arc::new(AtomicU64::new(0));
        for _ in 0..20 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(2));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();

        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(!pool.is_running());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_name("twice")).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(!pool.is_running());
    }

    #[test]
    fn test_idle_workers_exit_and_respawn() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("idle")
                .with_worker_count(2)
                .with_prestart(true)
                .with_idle_timeout(Duration::from_millis(30)),
        )
        .unwrap();
        assert_eq!(pool.stats().live_workers, 2);

        assert!(wait_until(Duration::from_secs(5), || pool.stats().live_workers == 0));

        let (tx, rx) = crossbeam_channel::unbounded();
        pool.execute(move || tx.send(()).unwrap()).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(0)).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }
}
