//! Tick-driven job scheduler.
//!
//! The scheduler owns a pending FIFO and an active set. Both are mutated only
//! through `&mut self`, which in a running server means only the heartbeat
//! thread, so neither needs a lock.
//!
//! Each [`Scheduler::tick`]:
//!
//! 1. Admits every pending job that is still running.
//! 2. For each active job: drops it if it stopped running, burns one paused
//!    tick if paused, otherwise advances its counter and fires it when the
//!    counter reaches the effective delay.
//! 3. Drops jobs that stopped running while firing.
//! 4. Queues jobs submitted from inside `fire()`; they are admitted on the
//!    following tick.
//!
//! A job whose `fire()` returns an error or panics is logged and kept; it is
//! tried again on its next period.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use super::error::JobFault;
use super::fault;
use super::job::{Job, JobKey, JobSnapshot};

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Jobs moved from pending to active.
    pub admitted: usize,
    /// Jobs whose action was invoked.
    pub fired: usize,
    /// Jobs removed from the active set.
    pub removed: usize,
    /// Active jobs remaining after the pass.
    pub active: usize,
    /// Faults raised by actions during the pass.
    pub faults: Vec<JobFault>,
}

/// Pending queue plus active set of jobs, advanced once per tick.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: VecDeque<Job>,
    active: Vec<Job>,
    ticks: u64,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job for admission on the next tick.
    ///
    /// A job built with `with_initial_run(true)` also fires right away. A fault
    /// in that first fire is logged and returned; the job is still queued.
    pub fn submit(&mut self, mut job: Job) -> Option<JobFault> {
        let mut fault = None;
        let mut spawned = Vec::new();
        if job.state.initial_run {
            fault = fire_guarded(&mut job, &mut spawned).err();
            job.state.current_delay = 0;
        }
        debug!(job = %job.id(), key = ?job.key(), delay = job.delay(), "job submitted");
        self.pending.push_back(job);
        for child in spawned {
            self.submit(child);
        }
        fault
    }

    /// Advance every job by one tick.
    pub fn tick(&mut self) -> TickSummary {
        self.ticks += 1;
        let mut summary = TickSummary::default();

        while let Some(job) = self.pending.pop_front() {
            if job.is_running() {
                self.active.push(job);
                summary.admitted += 1;
            }
        }

        let before = self.active.len();
        let mut spawned = Vec::new();
        self.active.retain_mut(|job| {
            if !job.state.running {
                return false;
            }
            if job.state.pause_delay > 0 {
                job.state.pause_delay -= 1;
                return true;
            }
            job.state.current_delay += 1;
            if job.state.current_delay >= job.state.delay {
                summary.fired += 1;
                if let Err(fault) = fire_guarded(job, &mut spawned) {
                    summary.faults.push(fault);
                }
                job.state.current_delay = 0;
            }
            job.state.running
        });
        summary.removed = before - self.active.len();
        summary.active = self.active.len();

        for job in spawned {
            summary.faults.extend(self.submit(job));
        }

        trace!(
            tick = self.ticks,
            admitted = summary.admitted,
            fired = summary.fired,
            removed = summary.removed,
            faults = summary.faults.len(),
            "scheduler pass"
        );
        summary
    }

    /// Stop every job with `key`, pending or active.
    ///
    /// Each job's cancellation hook runs exactly once; jobs already stopped are
    /// not counted again. Returns how many jobs were stopped by this call.
    pub fn cancel(&mut self, key: &JobKey) -> usize {
        let mut cancelled = 0;
        for job in self.active.iter_mut().chain(self.pending.iter_mut()) {
            if job.is_running() && job.key() == Some(key) {
                job.cancel();
                cancelled += 1;
            }
        }
        debug!(%key, cancelled, "cancelled jobs by key");
        cancelled
    }

    /// Running jobs with `key`, active first.
    #[must_use]
    pub fn retrieve(&self, key: &JobKey) -> Vec<JobSnapshot> {
        self.active
            .iter()
            .chain(self.pending.iter())
            .filter(|job| job.is_running() && job.key() == Some(key))
            .map(Job::snapshot)
            .collect()
    }

    /// Snapshot of the active set.
    #[must_use]
    pub fn active(&self) -> Vec<JobSnapshot> {
        self.active.iter().map(Job::snapshot).collect()
    }

    /// Snapshot of the pending queue, in admission order.
    #[must_use]
    pub fn pending(&self) -> Vec<JobSnapshot> {
        self.pending.iter().map(Job::snapshot).collect()
    }

    /// Number of active jobs.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of pending jobs.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ticks processed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Cancel and drop every job. Hooks of still-running jobs run once.
    pub fn shutdown(&mut self) {
        let count = self.active.len() + self.pending.len();
        for job in self.active.iter_mut().chain(self.pending.iter_mut()) {
            job.cancel();
        }
        self.active.clear();
        self.pending.clear();
        debug!(count, "scheduler shut down");
    }
}

fn fire_guarded(job: &mut Job, spawned: &mut Vec<Job>) -> Result<(), JobFault> {
    fault::guard(|| job.fire(spawned)).map_err(|message| {
        warn!(job = %job.id(), key = ?job.key(), error = %message, "job fault; retrying next period");
        JobFault {
            job: job.id(),
            key: job.key().cloned(),
            message,
        }
    })
}
