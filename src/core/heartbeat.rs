//! Fixed-period heartbeat driving every tick.
//!
//! One dedicated thread runs [`Heartbeat::tick`] every period. A tick runs
//! five phases in strict order:
//!
//! 1. Scheduler pass (timers, chains, recurring jobs).
//! 2. Network pump.
//! 3. Sequential entity logic.
//! 4. Parallel entity update behind the completion gate.
//! 5. Reset phase.
//!
//! Tick `n + 1` never starts before tick `n` returns. A failure that escapes
//! the phases is logged and followed by a best-effort `save_all`; the process
//! keeps running.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::HeartbeatConfig;

use super::barrier::{run_parallel_phase, EntityHandle, PhaseReport};
use super::error::{AppResult, EntityFault};
use super::fault;
use super::pools::PoolRegistry;
use super::scheduler::{Scheduler, TickSummary};
use super::worker_pool::{PoolError, WorkerPool};

/// Update applied to each entity in the parallel phase.
pub type EntityUpdate<E> = Box<dyn Fn(&mut E) -> AppResult<()> + Send + Sync>;

/// The simulation the heartbeat drives.
///
/// Every phase except the parallel update runs on the heartbeat thread with
/// exclusive access to the world. Returning `Err` from a phase aborts the
/// rest of the tick and triggers `save_all`.
pub trait World: Send + 'static {
    /// Per-entity state updated in the parallel phase.
    type Entity: Send + 'static;

    /// Read and dispatch pending client input.
    ///
    /// # Errors
    ///
    /// Any error is treated as a catastrophic tick failure.
    fn pump_network(&mut self, scheduler: &mut Scheduler) -> AppResult<()>;

    /// Logic that must see entities one at a time, such as movement or combat.
    ///
    /// # Errors
    ///
    /// Any error is treated as a catastrophic tick failure.
    fn process_sequential(&mut self, scheduler: &mut Scheduler) -> AppResult<()>;

    /// Snapshot of the entities to update this tick.
    fn active_entities(&self) -> Vec<EntityHandle<Self::Entity>>;

    /// Build this tick's entity update from world state. The returned closure
    /// runs once per entity on a pool thread with the entity locked; an error
    /// it returns flags that entity only.
    fn entity_update(&self) -> EntityUpdate<Self::Entity>;

    /// React to entities whose update failed: disconnect players, remove NPCs.
    ///
    /// # Errors
    ///
    /// Any error is treated as a catastrophic tick failure.
    fn on_entity_faults(&mut self, faults: &[EntityFault]) -> AppResult<()>;

    /// Clear per-tick flags once every entity has been updated.
    ///
    /// # Errors
    ///
    /// Any error is treated as a catastrophic tick failure.
    fn reset(&mut self) -> AppResult<()>;

    /// Persist everything. Called after a catastrophic tick and on shutdown.
    ///
    /// # Errors
    ///
    /// Errors are logged; nothing else depends on them.
    fn save_all(&mut self) -> AppResult<()>;
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Scheduler pass summary.
    pub jobs: TickSummary,
    /// Parallel entity phase summary.
    pub entities: PhaseReport,
    /// Wall time spent in the tick.
    pub elapsed: Duration,
    /// Message of a failure that aborted the tick, if any.
    pub fault: Option<String>,
}

impl TickReport {
    /// Whether every phase completed.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.fault.is_none()
    }
}

/// Owns the scheduler and the world, and runs ticks over them.
pub struct Heartbeat<W: World> {
    scheduler: Scheduler,
    world: W,
    pool: Arc<WorkerPool>,
    period: Duration,
    ticks: u64,
}

impl<W: World> Heartbeat<W> {
    /// Drive `world` with a fresh scheduler, updating entities on `pool`.
    pub fn new(world: W, pool: Arc<WorkerPool>, config: &HeartbeatConfig) -> Self {
        Self {
            scheduler: Scheduler::new(),
            world,
            pool,
            period: config.period(),
            ticks: 0,
        }
    }

    /// Like [`Heartbeat::new`], taking the entity pool named in `config`
    /// from `registry`.
    ///
    /// # Errors
    ///
    /// `PoolError::UnknownPool` when the registry has no such pool.
    pub fn from_registry(
        world: W,
        registry: &PoolRegistry,
        config: &HeartbeatConfig,
    ) -> Result<Self, PoolError> {
        let pool = registry.require(&config.entity_pool)?;
        Ok(Self::new(world, pool, config))
    }

    /// Scheduler shared with content code.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable scheduler, for submitting jobs between ticks.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &W {
        &self.world
    }

    /// Mutable world.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Configured period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Run one tick.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let start = Instant::now();
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        let scheduler = &mut self.scheduler;
        let world = &mut self.world;
        let pool = &self.pool;
        let jobs = &mut report.jobs;
        let entities = &mut report.entities;

        let outcome = fault::guard(|| {
            *jobs = scheduler.tick();
            world.pump_network(scheduler).context("network phase")?;
            world
                .process_sequential(scheduler)
                .context("sequential phase")?;

            let active = world.active_entities();
            *entities = run_parallel_phase(pool, &active, world.entity_update());
            if !entities.failed.is_empty() {
                world
                    .on_entity_faults(&entities.failed)
                    .context("entity fault handling")?;
            }

            world.reset().context("reset phase")
        });

        if let Err(message) = outcome {
            error!(tick = report.tick, error = %message, "tick failed, saving world");
            if let Err(save) = fault::guard(|| self.world.save_all()) {
                error!(tick = report.tick, error = %save, "save after failed tick also failed");
            }
            report.fault = Some(message);
        }

        report.elapsed = start.elapsed();
        debug!(
            tick = report.tick,
            fired = report.jobs.fired,
            job_faults = report.jobs.faults.len(),
            entities = report.entities.total(),
            entity_faults = report.entities.failed.len(),
            elapsed_ms = millis(report.elapsed),
            "tick complete"
        );
        report
    }

    /// Cancel every job and save the world. The heartbeat must not be ticked
    /// afterwards.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        if let Err(e) = fault::guard(|| self.world.save_all()) {
            error!(error = %e, "save on shutdown failed");
        }
        info!(ticks = self.ticks, "heartbeat shut down");
    }

    /// Move the heartbeat onto its own thread, ticking every period until
    /// [`HeartbeatHandle::stop`].
    ///
    /// A tick that runs past its slot is logged and the next one starts right
    /// away; missed slots are not replayed.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn start(self) -> AppResult<HeartbeatHandle<W>> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || {
                let mut heartbeat = self;
                let period = heartbeat.period;
                info!(period_ms = millis(period), "heartbeat started");

                let mut next = Instant::now();
                loop {
                    heartbeat.tick();

                    next += period;
                    let now = Instant::now();
                    if now > next {
                        warn!(
                            tick = heartbeat.ticks,
                            overrun_ms = millis(now - next),
                            "tick exceeded period"
                        );
                        next = now;
                    }

                    match stop_rx.recv_timeout(next.saturating_duration_since(now)) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                info!(ticks = heartbeat.ticks, "heartbeat stopped");
                heartbeat
            })
            .context("failed to spawn heartbeat thread")?;

        Ok(HeartbeatHandle { stop_tx, thread })
    }
}

impl<W: World + std::fmt::Debug> std::fmt::Debug for Heartbeat<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("world", &self.world)
            .field("scheduler", &self.scheduler)
            .field("pool", &self.pool.name())
            .field("period", &self.period)
            .field("ticks", &self.ticks)
            .finish()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Handle to a running heartbeat thread.
#[derive(Debug)]
pub struct HeartbeatHandle<W: World> {
    stop_tx: Sender<()>,
    thread: JoinHandle<Heartbeat<W>>,
}

impl<W: World> HeartbeatHandle<W> {
    /// Whether the heartbeat thread is still ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Stop after the current tick and hand the heartbeat back.
    ///
    /// # Errors
    ///
    /// Fails if the heartbeat thread panicked.
    pub fn stop(self) -> AppResult<Heartbeat<W>> {
        // A disconnected stop channel ends the loop after the current tick
        drop(self.stop_tx);
        self.thread
            .join()
            .map_err(|payload| {
                anyhow!("heartbeat thread {}", fault::panic_message(payload.as_ref()))
            })
    }
}
