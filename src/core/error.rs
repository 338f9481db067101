//! Error and fault types for the tick core.
//!
//! Faults are contained to the unit of work that raised them. They are
//! recorded and returned in reports, never propagated raw through the
//! heartbeat thread.

use thiserror::Error;

use crate::core::barrier::{EntityId, EntityKind};
use crate::core::job::{JobId, JobKey};

/// A failure raised inside a job's `fire()`.
///
/// The job stays active and is attempted again on its next period.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("job {job} faulted: {message}")]
pub struct JobFault {
    /// Job that raised the fault.
    pub job: JobId,
    /// Key the job was submitted with, if any.
    pub key: Option<JobKey>,
    /// Error or panic message.
    pub message: String,
}

/// What the caller should do with an entity whose parallel update failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDisposition {
    /// Disconnect the owning session (players).
    Disconnect,
    /// Remove the entity from the world (NPCs).
    Remove,
}

/// A failure raised inside one entity's parallel update.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} entity {entity} update failed: {message}")]
pub struct EntityFault {
    /// Entity whose update failed.
    pub entity: EntityId,
    /// Kind of entity, used to pick the disposition.
    pub kind: EntityKind,
    /// Error or panic message.
    pub message: String,
}

impl EntityFault {
    /// Players are disconnected, everything else is removed.
    #[must_use]
    pub const fn disposition(&self) -> FaultDisposition {
        match self.kind {
            EntityKind::Player => FaultDisposition::Disconnect,
            EntityKind::Npc => FaultDisposition::Remove,
        }
    }
}

/// Invalid use of a chain.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Links cannot be appended while the chain is playing.
    #[error("cannot append to a running chain")]
    Running,
    /// Link delays are whole ticks and must be positive.
    #[error("chain link delay must be at least 1 tick, got {0}")]
    InvalidDelay(u64),
    /// A chain needs at least one link to run.
    #[error("cannot run an empty chain")]
    Empty,
    /// The chain is already playing.
    #[error("chain is already running")]
    AlreadyRunning,
}

/// Configuration could not be loaded or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {value}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value found.
        value: String,
    },
    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application-facing result using anyhow for collaborator code.
pub type AppResult<T> = Result<T, anyhow::Error>;
