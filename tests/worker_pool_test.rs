//! Integration tests for WorkerPool
//!
//! These tests validate real-world pool behaviour:
//! - Concurrent submission from many threads
//! - Rejection policies under a saturated queue
//! - Lossless shutdown
//! - Registry lifecycle

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use tick_engine::config::{RejectionPolicy, WorkerPoolConfig};
use tick_engine::core::{PoolError, PoolRegistry, RejectionReason, WorkerPool};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Occupy the pool's only worker until the returned sender is dropped.
fn block_worker(pool: &WorkerPool) -> crossbeam_channel::Sender<()> {
    let (release_tx, release_rx) = bounded::<()>(0);
    let (started_tx, started_rx) = bounded::<()>(0);
    pool.execute(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    })
    .unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    release_tx
}

fn single_worker(name: &str, rejection: RejectionPolicy) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new()
            .with_name(name)
            .with_worker_count(1)
            .with_max_queue_depth(2)
            .with_prestart(true)
            .with_rejection(rejection),
    )
    .unwrap()
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
fn test_concurrent_submission() {
    let pool = Arc::new(
        WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name("io")
                .with_worker_count(4)
                .with_max_queue_depth(1024),
        )
        .unwrap(),
    );
    let done = Arc::new(AtomicU64::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..100 {
                    let done = Arc::clone(&done);
                    pool.execute(move || {
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in submitters {
        handle.join().unwrap();
    }
    pool.shutdown();

    assert_eq!(done.load(Ordering::SeqCst), 400);
    let stats = pool.stats();
    assert_eq!(stats.submitted_tasks, 400);
    assert_eq!(stats.completed_tasks, 400);
    assert_eq!(stats.queued_tasks, 0);
}

// ============================================================================
// REJECTION
// ============================================================================

#[test]
fn test_abort_policy_reports_full_queue() {
    let pool = single_worker("strict", RejectionPolicy::Abort);
    let release = block_worker(&pool);
    pool.execute(|| {}).unwrap();
    pool.execute(|| {}).unwrap();

    let err = pool.execute(|| {}).unwrap_err();
    assert_eq!(
        err,
        PoolError::Rejected {
            pool: "strict".into(),
            reason: RejectionReason::QueueFull,
        }
    );
    assert_eq!(
        err.to_string(),
        "task rejected by pool `strict`: no space in work queue"
    );

    drop(release);
    pool.shutdown();
    assert_eq!(pool.stats().rejected_tasks, 1);
}

#[test]
fn test_caller_runs_policy_runs_on_submitter() {
    let pool = single_worker("lenient", RejectionPolicy::CallerRuns);
    let release = block_worker(&pool);
    pool.execute(|| {}).unwrap();
    pool.execute(|| {}).unwrap();

    let caller = thread::current().id();
    let (tx, rx) = bounded(1);
    pool.execute(move || tx.send(thread::current().id()).unwrap())
        .unwrap();
    assert_eq!(rx.recv().unwrap(), caller);

    drop(release);
    pool.shutdown();
    assert_eq!(pool.stats().caller_runs, 1);
}

#[test]
fn test_submit_after_shutdown() {
    let pool = single_worker("closed", RejectionPolicy::Abort);
    pool.shutdown();
    let err = pool.execute(|| {}).unwrap_err();
    assert!(err.to_string().ends_with("pool not running"));
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_registry_drains_on_shutdown() {
    let registry = PoolRegistry::init(vec![
        WorkerPoolConfig::new().with_name("io").with_worker_count(1),
        WorkerPoolConfig::new()
            .with_name("login")
            .with_worker_count(1)
            .with_idle_timeout(Duration::from_millis(20)),
    ])
    .unwrap();

    let saved = Arc::new(AtomicU64::new(0));
    let io = registry.get("io").unwrap();
    for _ in 0..10 {
        let saved = Arc::clone(&saved);
        io.execute(move || {
            thread::sleep(Duration::from_millis(1));
            saved.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    registry.shutdown();

    assert_eq!(saved.load(Ordering::SeqCst), 10);
    assert!(!io.is_running());
    assert!(registry.stats().iter().all(|s| s.live_workers == 0));
}
