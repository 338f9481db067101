//! Schedulable units of work.
//!
//! A [`Job`] carries its timing state as plain fields and its behaviour as a
//! boxed closure, so the scheduler has no knowledge of what the work is.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::fault;
use super::rate::Rate;
use super::AppResult;

/// Unique identifier of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grouping key used for batch cancellation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKey {
    /// Work owned by a world entity, keyed by its index.
    Entity(u64),
    /// Work owned by a named subsystem (e.g. `"shop-restock"`).
    Named(String),
}

impl From<u64> for JobKey {
    fn from(index: u64) -> Self {
        Self::Entity(index)
    }
}

impl From<&str> for JobKey {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for JobKey {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(index) => write!(f, "entity:{index}"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// The work performed each time a job fires.
pub type JobAction = Box<dyn FnMut(&mut JobContext<'_>) -> AppResult<()> + Send>;

/// Hook invoked exactly once when a job is cancelled.
pub type CancelHook = Box<dyn FnOnce() + Send>;

/// Timing and lifecycle fields of a job.
#[derive(Debug, Clone)]
pub(crate) struct JobState {
    pub(crate) id: JobId,
    pub(crate) key: Option<JobKey>,
    pub(crate) rate: Rate,
    /// Delay as requested, in units of `rate`.
    pub(crate) requested_delay: u64,
    /// Effective delay in ticks.
    pub(crate) delay: u64,
    pub(crate) current_delay: u64,
    pub(crate) pause_delay: u64,
    pub(crate) running: bool,
    pub(crate) initial_run: bool,
    pub(crate) fire_count: u64,
}

impl JobState {
    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            key: self.key.clone(),
            rate: self.rate,
            delay: self.delay,
            current_delay: self.current_delay,
            pause_delay: self.pause_delay,
            running: self.running,
            fire_count: self.fire_count,
        }
    }
}

/// A schedulable, possibly recurring unit of work.
///
/// ```
/// use tick_engine::core::{Job, Rate, Scheduler};
///
/// let mut scheduler = Scheduler::new();
/// let job = Job::new(5, |ctx| {
///     // restock the shop, then stop
///     ctx.cancel();
///     Ok(())
/// })
/// .with_rate(Rate::ExactMinute)
/// .with_key("shop-restock");
/// scheduler.submit(job);
/// ```
pub struct Job {
    pub(crate) state: JobState,
    action: JobAction,
    on_cancel: Option<CancelHook>,
}

impl Job {
    /// Create a running job firing every `delay` ticks.
    pub fn new<F>(delay: u64, action: F) -> Self
    where
        F: FnMut(&mut JobContext<'_>) -> AppResult<()> + Send + 'static,
    {
        let rate = Rate::Default;
        Self {
            state: JobState {
                id: JobId::new(),
                key: None,
                rate,
                requested_delay: delay,
                delay: rate.ticks(delay),
                current_delay: 0,
                pause_delay: 0,
                running: true,
                initial_run: false,
                fire_count: 0,
            },
            action: Box::new(action),
            on_cancel: None,
        }
    }

    /// Interpret the delay in units of `rate`.
    #[must_use]
    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.state.rate = rate;
        self.state.delay = rate.ticks(self.state.requested_delay);
        self
    }

    /// Attach a key for batch cancellation and lookup.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<JobKey>) -> Self {
        self.state.key = Some(key.into());
        self
    }

    /// Fire once synchronously at submission, in addition to the schedule.
    #[must_use]
    pub const fn with_initial_run(mut self, initial_run: bool) -> Self {
        self.state.initial_run = initial_run;
        self
    }

    /// Hold the delay counter for `ticks` ticks after admission.
    #[must_use]
    pub const fn paused_for(mut self, ticks: u64) -> Self {
        self.state.pause_delay = ticks;
        self
    }

    /// Run `hook` when the job is cancelled, by key or from inside `fire()`.
    #[must_use]
    pub fn on_cancel<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Identifier assigned at construction.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.state.id
    }

    /// Key, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&JobKey> {
        self.state.key.as_ref()
    }

    /// Effective delay in ticks.
    #[must_use]
    pub const fn delay(&self) -> u64 {
        self.state.delay
    }

    /// Whether the job is still scheduled.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.running
    }

    /// Read-only view for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        self.state.snapshot()
    }

    /// Stop the job and run its cancellation hook if this is the first stop.
    pub(crate) fn cancel(&mut self) {
        cancel_state(&mut self.state, &mut self.on_cancel);
    }

    /// Invoke the action. Jobs it submits are appended to `spawned`.
    pub(crate) fn fire(&mut self, spawned: &mut Vec<Job>) -> AppResult<()> {
        self.state.fire_count += 1;
        let mut ctx = JobContext {
            state: &mut self.state,
            on_cancel: &mut self.on_cancel,
            spawned,
        };
        (self.action)(&mut ctx)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("state", &self.state)
            .field("has_cancel_hook", &self.on_cancel.is_some())
            .finish_non_exhaustive()
    }
}

fn cancel_state(state: &mut JobState, on_cancel: &mut Option<CancelHook>) {
    if !state.running {
        return;
    }
    state.running = false;
    if let Some(hook) = on_cancel.take() {
        if let Err(message) = fault::guard(|| {
            hook();
            Ok(())
        }) {
            warn!(job = %state.id, key = ?state.key, error = %message, "cancel hook failed");
        }
    }
}

/// Handle given to a job's action while it fires.
pub struct JobContext<'a> {
    state: &'a mut JobState,
    on_cancel: &'a mut Option<CancelHook>,
    spawned: &'a mut Vec<Job>,
}

impl JobContext<'_> {
    /// Stop the job; it is swept before the next tick processes it.
    pub fn cancel(&mut self) {
        cancel_state(self.state, self.on_cancel);
    }

    /// Whether the job is still scheduled.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.running
    }

    /// Change the delay, in units of the job's rate. Applies at the next
    /// comparison.
    pub fn set_delay(&mut self, delay: u64) {
        self.state.requested_delay = delay;
        self.state.delay = self.state.rate.ticks(delay);
    }

    /// Freeze the delay counter for `ticks` ticks.
    pub fn pause(&mut self, ticks: u64) {
        self.state.pause_delay = ticks;
    }

    /// Effective delay in ticks.
    #[must_use]
    pub const fn delay(&self) -> u64 {
        self.state.delay
    }

    /// Key, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&JobKey> {
        self.state.key.as_ref()
    }

    /// Job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.state.id
    }

    /// Number of times the job has fired, including this one.
    #[must_use]
    pub const fn fire_count(&self) -> u64 {
        self.state.fire_count
    }

    /// Submit a follow-up job. It is queued once the current pass ends and
    /// admitted on the next tick; an initial run still fires at once.
    pub fn submit(&mut self, job: Job) -> JobId {
        let id = job.id();
        self.spawned.push(job);
        id
    }
}

/// Read-only snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub id: JobId,
    /// Key, if any.
    pub key: Option<JobKey>,
    /// Rate the delay was expressed in.
    pub rate: Rate,
    /// Effective delay in ticks.
    pub delay: u64,
    /// Ticks counted since the last fire.
    pub current_delay: u64,
    /// Remaining paused ticks.
    pub pause_delay: u64,
    /// Whether the job is still scheduled.
    pub running: bool,
    /// Times fired so far.
    pub fire_count: u64,
}
