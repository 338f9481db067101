//! Parallel entity phase and the completion gate that joins it.
//!
//! The heartbeat fans one update job per active entity out to the entity
//! pool, then blocks on a [`CompletionGate`] until every job has reported.
//! Each job holds its entity's lock only while the update runs, and always
//! signals the gate, whether the update succeeded, failed, panicked or was
//! never accepted by the pool.
//!
//! ```rust
//! use tick_engine::config::WorkerPoolConfig;
//! use tick_engine::core::{run_parallel_phase, EntityHandle, EntityKind, WorkerPool};
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2))?;
//! let entities: Vec<_> = (0..4_u64)
//!     .map(|id| EntityHandle::new(id, EntityKind::Npc, 0_u32))
//!     .collect();
//!
//! let report = run_parallel_phase(&pool, &entities, |hp: &mut u32| {
//!     *hp += 1;
//!     Ok(())
//! });
//! assert_eq!(report.succeeded, 4);
//! assert!(report.failed.is_empty());
//! # pool.shutdown();
//! # Ok::<(), tick_engine::core::PoolError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::error::{AppResult, EntityFault};
use super::fault;
use super::worker_pool::WorkerPool;

/// Identifier of a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of entity, which decides what happens when its update fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A connected player.
    Player,
    /// A non-player character.
    Npc,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Npc => write!(f, "npc"),
        }
    }
}

/// Shared handle to one entity's state.
///
/// The cell is the entity's exclusive lock. `parking_lot` locks do not
/// poison, so a panicking update leaves the entity usable for the caller's
/// disconnect or removal logic.
#[derive(Debug)]
pub struct EntityHandle<E> {
    /// Entity identifier.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity state behind its lock.
    pub cell: Arc<Mutex<E>>,
}

impl<E> EntityHandle<E> {
    /// Wrap `state` in a new handle.
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, state: E) -> Self {
        Self {
            id: id.into(),
            kind,
            cell: Arc::new(Mutex::new(state)),
        }
    }
}

impl<E> Clone for EntityHandle<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Countdown latch sized to the number of jobs in one phase.
///
/// A gate is created fresh for each phase and never reset.
#[derive(Debug)]
pub struct CompletionGate {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl CompletionGate {
    /// A gate that opens after `count` signals.
    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    /// Record one completion. Extra signals after the gate opened are ignored.
    pub fn signal(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.done.notify_all();
            }
        }
    }

    /// Block until every job has signalled.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.done.wait(&mut remaining);
        }
    }

    /// Signals still outstanding.
    #[must_use]
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    /// Guard that signals this gate when dropped, including during unwinding.
    #[must_use]
    pub fn signal_on_drop(self: &Arc<Self>) -> GateSignal {
        GateSignal {
            gate: Arc::clone(self),
        }
    }
}

/// Signals its gate exactly once, on drop.
#[derive(Debug)]
pub struct GateSignal {
    gate: Arc<CompletionGate>,
}

impl Drop for GateSignal {
    fn drop(&mut self) {
        self.gate.signal();
    }
}

/// Outcome of one parallel phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Entities whose update finished cleanly.
    pub succeeded: usize,
    /// Entities whose update failed, panicked or could not be scheduled.
    pub failed: Vec<EntityFault>,
}

impl PhaseReport {
    /// Entities covered by the report.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

#[derive(Debug, Default)]
struct Outcomes {
    succeeded: AtomicUsize,
    failed: Mutex<Vec<EntityFault>>,
}

impl Outcomes {
    fn record(&self, id: EntityId, kind: EntityKind, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(message) => {
                warn!(entity = %id, %kind, error = %message, "entity update failed");
                self.failed.lock().push(EntityFault {
                    entity: id,
                    kind,
                    message,
                });
            }
        }
    }
}

/// Run `update` once for every entity on `pool` and wait for all of them.
///
/// Each job locks its entity, runs `update` inside the fault boundary and
/// records the outcome. A submission the pool refuses is recorded as a
/// failure for that entity. There is no timeout: a job that never returns
/// blocks the caller.
pub fn run_parallel_phase<E, F>(
    pool: &WorkerPool,
    entities: &[EntityHandle<E>],
    update: F,
) -> PhaseReport
where
    E: Send + 'static,
    F: Fn(&mut E) -> AppResult<()> + Send + Sync + 'static,
{
    if entities.is_empty() {
        return PhaseReport::default();
    }

    let gate = Arc::new(CompletionGate::new(entities.len()));
    let outcomes = Arc::new(Outcomes::default());
    let update = Arc::new(update);

    for entity in entities {
        let job_gate = gate.signal_on_drop();
        let job_entity = entity.clone();
        let job_outcomes = Arc::clone(&outcomes);
        let job_update = Arc::clone(&update);

        let submitted = pool.execute(move || {
            let _signal = job_gate;
            let result = fault::guard(|| {
                let mut state = job_entity.cell.lock();
                job_update(&mut state)
            });
            job_outcomes.record(job_entity.id, job_entity.kind, result);
        });

        // A refused closure is dropped unrun, which signals its gate guard
        if let Err(e) = submitted {
            outcomes.record(entity.id, entity.kind, Err(e.to_string()));
        }
    }

    gate.wait();

    let report = PhaseReport {
        succeeded: outcomes.succeeded.load(Ordering::Relaxed),
        failed: std::mem::take(&mut *outcomes.failed.lock()),
    };
    debug!(
        pool = %pool.name(),
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "parallel phase complete"
    );
    report
}
