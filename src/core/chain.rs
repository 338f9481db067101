//! Sequenced delayed effects driven by a single scheduled job.
//!
//! A [`Chain`] holds an ordered list of `(delay, action)` links. Running it
//! copies the links into a play queue and submits one job that ticks through
//! them, so a ten-step teleport costs one job instead of ten.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ChainError;
use super::job::{Job, JobContext, JobId, JobKey};
use super::rate::Rate;
use super::scheduler::Scheduler;
use super::AppResult;

/// Action fired by a chain link.
pub type LinkAction = Arc<dyn Fn() -> AppResult<()> + Send + Sync>;

/// One step of a chain.
#[derive(Clone)]
pub struct ChainLink {
    delay: u64,
    action: LinkAction,
}

impl ChainLink {
    /// Delay in chain periods, relative to the previous link.
    #[must_use]
    pub const fn delay(&self) -> u64 {
        self.delay
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Chain behaviour settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Length of one chain period.
    #[serde(default)]
    pub rate: Rate,
    /// Drop the link definitions once the chain finishes or is halted.
    #[serde(default)]
    pub clear_on_finish: bool,
    /// Key for the driving job, so `Scheduler::cancel` can stop the chain.
    #[serde(default)]
    pub key: Option<JobKey>,
}

#[derive(Debug, Default)]
struct ChainState {
    links: Vec<ChainLink>,
    play: VecDeque<ChainLink>,
    elapsed: u64,
    running: bool,
    /// Bumped on every `run()`; a job from an older run stops itself.
    generation: u64,
}

impl ChainState {
    fn finish(&mut self, clear_on_finish: bool) {
        self.play.clear();
        self.elapsed = 0;
        self.running = false;
        if clear_on_finish {
            self.links.clear();
        }
    }
}

/// An ordered sequence of timed actions played by one scheduled job.
///
/// ```
/// use tick_engine::core::{Chain, Scheduler};
///
/// let mut scheduler = Scheduler::new();
/// let chain = Chain::new();
/// chain.append(3, || Ok(()))?; // cast animation
/// chain.append(2, || Ok(()))?; // move the player
/// chain.run(&mut scheduler)?;
/// for _ in 0..5 {
///     scheduler.tick();
/// }
/// assert!(!chain.is_running());
/// # Ok::<(), tick_engine::core::ChainError>(())
/// ```
#[derive(Clone)]
pub struct Chain {
    state: Arc<Mutex<ChainState>>,
    config: ChainConfig,
}

impl Chain {
    /// Create an empty chain with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ChainConfig::default())
    }

    /// Create an empty chain.
    #[must_use]
    pub fn with_config(config: ChainConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::default())),
            config,
        }
    }

    /// Add a link firing `delay` periods after the previous one.
    ///
    /// # Errors
    ///
    /// - `ChainError::Running` while the chain is playing
    /// - `ChainError::InvalidDelay` if `delay` is 0
    pub fn append<F>(&self, delay: u64, action: F) -> Result<(), ChainError>
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        if state.running {
            return Err(ChainError::Running);
        }
        if delay == 0 {
            return Err(ChainError::InvalidDelay(delay));
        }
        state.links.push(ChainLink {
            delay,
            action: Arc::new(action),
        });
        Ok(())
    }

    /// Start playing the chain on `scheduler`.
    ///
    /// # Errors
    ///
    /// - `ChainError::Empty` if no links were appended
    /// - `ChainError::AlreadyRunning` if the chain is playing
    pub fn run(&self, scheduler: &mut Scheduler) -> Result<JobId, ChainError> {
        let job = self.start()?;
        let id = job.id();
        scheduler.submit(job);
        Ok(id)
    }

    /// Start playing the chain from inside a firing job. The driving job is
    /// admitted on the next tick.
    ///
    /// # Errors
    ///
    /// Same as [`Chain::run`].
    pub fn run_from(&self, ctx: &mut JobContext<'_>) -> Result<JobId, ChainError> {
        let job = self.start()?;
        Ok(ctx.submit(job))
    }

    fn start(&self) -> Result<Job, ChainError> {
        let generation = {
            let mut state = self.state.lock();
            if state.running {
                return Err(ChainError::AlreadyRunning);
            }
            if state.links.is_empty() {
                return Err(ChainError::Empty);
            }
            state.play = state.links.iter().cloned().collect();
            state.elapsed = 0;
            state.running = true;
            state.generation += 1;
            state.generation
        };

        let shared = Arc::clone(&self.state);
        let released = Arc::clone(&self.state);
        let clear_on_finish = self.config.clear_on_finish;
        let mut job = Job::new(1, move |ctx| step(&shared, generation, clear_on_finish, ctx))
            .with_rate(self.config.rate)
            .on_cancel(move || release(&released, generation, clear_on_finish));
        if let Some(key) = &self.config.key {
            job = job.with_key(key.clone());
        }
        debug!(job = %job.id(), generation, "chain started");
        Ok(job)
    }

    /// Ask the chain to stop. The driving job notices on its next period; an
    /// action that is already executing is not interrupted.
    pub fn halt(&self) {
        let mut state = self.state.lock();
        if state.running {
            state.finish(self.config.clear_on_finish);
            debug!(generation = state.generation, "chain halted");
        }
    }

    /// Whether the chain is playing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Number of defined links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().links.len()
    }

    /// Whether no links are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().links.is_empty()
    }

    /// Links still waiting to fire in the current run.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.lock().play.len()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Chain")
            .field("links", &state.links.len())
            .field("remaining", &state.play.len())
            .field("running", &state.running)
            .field("config", &self.config)
            .finish()
    }
}

/// One period of the driving job.
///
/// The state lock is released before the due link fires and before the job
/// is cancelled, so an action or the cancel hook may call back into the chain.
fn step(
    shared: &Mutex<ChainState>,
    generation: u64,
    clear_on_finish: bool,
    ctx: &mut JobContext<'_>,
) -> AppResult<()> {
    let due = {
        let mut state = shared.lock();
        if !state.running || state.generation != generation {
            None
        } else if let Some(head_delay) = state.play.front().map(ChainLink::delay) {
            state.elapsed += 1;
            if state.elapsed < head_delay {
                return Ok(());
            }
            state.elapsed = 0;
            state.play.pop_front()
        } else {
            state.finish(clear_on_finish);
            None
        }
    };

    let Some(link) = due else {
        ctx.cancel();
        return Ok(());
    };
    let outcome = (link.action)();

    let finished = {
        let mut state = shared.lock();
        let finished = state.generation == generation && state.running && state.play.is_empty();
        if finished {
            state.finish(clear_on_finish);
        }
        finished
    };
    if finished {
        debug!(generation, "chain finished");
        ctx.cancel();
    }
    outcome
}

/// Cancel hook of the driving job: a job stopped from outside (e.g. by key)
/// leaves its chain appendable again.
fn release(shared: &Mutex<ChainState>, generation: u64, clear_on_finish: bool) {
    let mut state = shared.lock();
    if state.running && state.generation == generation {
        state.finish(clear_on_finish);
        debug!(generation, "chain job cancelled");
    }
}
