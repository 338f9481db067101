//! Configuration models for pools and the heartbeat.

pub mod engine;
pub mod pool;

pub use engine::{EngineConfig, HeartbeatConfig, ENTITY_POOL, IO_POOL};
pub use pool::{RejectionPolicy, ThreadPriority, WorkerPoolConfig};
