//! # Tick Engine
//!
//! The real-time core of a tick-based multiplayer game server.
//!
//! A single heartbeat thread fires every 600 ms and drives all simulation.
//! Content code never spawns its own timers: it submits jobs to the
//! [`Scheduler`](core::Scheduler), plays short timed sequences through a
//! [`Chain`](core::Chain), and lets the heartbeat fan entity updates out to a
//! bounded [`WorkerPool`](core::WorkerPool) each tick.
//!
//! ## Tick Phases
//!
//! Every tick runs, in order and never interleaved with the next tick:
//!
//! 1. **Scheduler**: admit pending jobs, advance counters, fire due jobs
//! 2. **Network**: pump client input
//! 3. **Sequential**: entity logic that must run one entity at a time
//! 4. **Parallel**: one update job per entity, joined by a completion gate
//! 5. **Reset**: clear per-tick flags
//!
//! ## Fault Isolation
//!
//! - A job that errors or panics is logged and retried on its next period
//! - An entity whose update fails is reported for disconnect (players) or
//!   removal (NPCs); every other entity is still updated
//! - A failure escaping the phases is logged and the world is saved
//!
//! ## Scheduling Work
//!
//! ```rust
//! use tick_engine::core::{Job, Rate, Scheduler};
//!
//! let mut scheduler = Scheduler::new();
//!
//! // Every minute, until cancelled
//! scheduler.submit(
//!     Job::new(1, |_ctx| {
//!         // restock shops
//!         Ok(())
//!     })
//!     .with_rate(Rate::ExactMinute)
//!     .with_key("shop-restock"),
//! );
//!
//! scheduler.tick();
//! assert_eq!(scheduler.active_len(), 1);
//! ```
//!
//! ## Timed Sequences
//!
//! ```rust
//! use tick_engine::core::{Chain, ChainError, Scheduler};
//!
//! let mut scheduler = Scheduler::new();
//! let teleport = Chain::new();
//! teleport.append(1, || Ok(()))?; // play animation
//! teleport.append(3, || Ok(()))?; // move player
//! teleport.run(&mut scheduler)?;
//!
//! assert_eq!(teleport.append(1, || Ok(())), Err(ChainError::Running));
//! # Ok::<(), ChainError>(())
//! ```
//!
//! ## Startup
//!
//! ```rust,ignore
//! use tick_engine::builders::build_registry;
//! use tick_engine::config::EngineConfig;
//! use tick_engine::core::Heartbeat;
//!
//! tick_engine::util::init_tracing();
//! let config = EngineConfig::from_env()?;
//! let pools = build_registry(&config)?;
//! let heartbeat = Heartbeat::from_registry(my_world, &pools, &config.heartbeat)?;
//! let running = heartbeat.start()?;
//! // ...
//! let mut heartbeat = running.stop()?;
//! heartbeat.shutdown();
//! pools.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tick core: scheduler, chains, barrier, pools and heartbeat.
pub mod core;
/// Configuration models for pools and the heartbeat.
pub mod config;
/// Builders to construct engine components from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
