//! Tick core: scheduler, chains, the parallel entity barrier, worker pools
//! and the heartbeat that drives them.

pub mod barrier;
pub mod chain;
pub mod error;
pub(crate) mod fault;
pub mod heartbeat;
pub mod job;
pub mod pools;
pub mod rate;
pub mod scheduler;
pub mod worker_pool;

pub use barrier::{
    run_parallel_phase, CompletionGate, EntityHandle, EntityId, EntityKind, GateSignal,
    PhaseReport,
};
pub use chain::{Chain, ChainConfig, ChainLink, LinkAction};
pub use error::{AppResult, ChainError, ConfigError, EntityFault, FaultDisposition, JobFault};
pub use heartbeat::{EntityUpdate, Heartbeat, HeartbeatHandle, TickReport, World};
pub use job::{CancelHook, Job, JobAction, JobContext, JobId, JobKey, JobSnapshot};
pub use pools::PoolRegistry;
pub use rate::{Rate, TICK_PERIOD};
pub use scheduler::{Scheduler, TickSummary};
pub use worker_pool::{PoolError, PoolStats, RejectionReason, WorkerPool};
