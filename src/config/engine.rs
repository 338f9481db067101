//! Root engine configuration: heartbeat timing and named pools.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pool::{RejectionPolicy, ThreadPriority, WorkerPoolConfig};
use crate::core::ConfigError;

/// Pool used by the parallel entity update phase.
pub const ENTITY_POOL: &str = "entity-update";
/// Pool for fire-and-forget disk persistence.
pub const IO_POOL: &str = "io";

/// Heartbeat timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Period between ticks in milliseconds.
    pub period_ms: u64,
    /// Name of the pool used for the parallel entity phase.
    #[serde(default = "default_entity_pool")]
    pub entity_pool: String,
}

fn default_entity_pool() -> String {
    ENTITY_POOL.to_string()
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period_ms: 600,
            entity_pool: default_entity_pool(),
        }
    }
}

impl HeartbeatConfig {
    /// Tick period as a duration.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Heartbeat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Pools created at startup.
    pub pools: Vec<WorkerPoolConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            pools: vec![
                WorkerPoolConfig::new()
                    .with_name(ENTITY_POOL)
                    .with_worker_count(num_cpus::get())
                    .with_max_queue_depth(4096)
                    .with_advisory_priority(ThreadPriority::High)
                    .with_prestart(true)
                    .with_rejection(RejectionPolicy::CallerRuns),
                WorkerPoolConfig::new()
                    .with_name(IO_POOL)
                    .with_worker_count(2)
                    .with_max_queue_depth(1024)
                    .with_advisory_priority(ThreadPriority::Low)
                    .with_idle_timeout_minutes(1),
            ],
        }
    }
}

impl EngineConfig {
    /// Validate heartbeat timing and every pool; pool names must be unique and
    /// the entity pool must exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat period_ms must be greater than 0".into(),
            ));
        }
        for (idx, pool) in self.pools.iter().enumerate() {
            pool.validate()
                .map_err(|e| ConfigError::Invalid(format!("pool `{}` invalid: {e}", pool.name)))?;
            if self.pools[..idx].iter().any(|p| p.name == pool.name) {
                return Err(ConfigError::Invalid(format!(
                    "pool `{}` defined more than once",
                    pool.name
                )));
            }
        }
        if self.pool(&self.heartbeat.entity_pool).is_none() {
            return Err(ConfigError::Invalid(format!(
                "entity pool `{}` is not defined",
                self.heartbeat.entity_pool
            )));
        }
        Ok(())
    }

    /// Look up a pool definition by name.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<&WorkerPoolConfig> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by environment variables,
    /// loading a `.env` file first if one exists.
    ///
    /// Recognised variables: `TICK_PERIOD_MS`, `ENTITY_POOL_WORKERS`,
    /// `ENTITY_POOL_QUEUE_DEPTH`, `POOL_REJECTION` (`caller_runs` or `abort`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` for unparsable values, or a validation error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(period) = env_parse::<u64>("TICK_PERIOD_MS")? {
            cfg.heartbeat.period_ms = period;
        }
        let entity_pool = cfg.heartbeat.entity_pool.clone();
        if let Some(pool) = cfg.pools.iter_mut().find(|p| p.name == entity_pool) {
            if let Some(workers) = env_parse::<usize>("ENTITY_POOL_WORKERS")? {
                pool.worker_count = workers;
            }
            if let Some(depth) = env_parse::<usize>("ENTITY_POOL_QUEUE_DEPTH")? {
                pool.max_queue_depth = depth;
            }
        }
        if let Ok(raw) = env::var("POOL_REJECTION") {
            let policy = match raw.trim() {
                "caller_runs" => RejectionPolicy::CallerRuns,
                "abort" => RejectionPolicy::Abort,
                _ => {
                    return Err(ConfigError::Env {
                        var: "POOL_REJECTION",
                        value: raw,
                    })
                }
            };
            for pool in &mut cfg.pools {
                pool.rejection = policy;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.heartbeat.period(), Duration::from_millis(600));
        assert!(cfg.pool(ENTITY_POOL).is_some());
        assert!(cfg.pool(IO_POOL).is_some());
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.heartbeat.period_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_duplicate_pool_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.pools.push(WorkerPoolConfig::new().with_name(IO_POOL));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_missing_entity_pool_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.pools.retain(|p| p.name != ENTITY_POOL);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_str() {
        let cfg = EngineConfig::from_json_str(
            r#"{
                "heartbeat": {"period_ms": 50},
                "pools": [
                    {"name": "entity-update", "worker_count": 2, "max_queue_depth": 16,
                     "rejection": "caller_runs", "prestart": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.heartbeat.period_ms, 50);
        assert_eq!(cfg.heartbeat.entity_pool, ENTITY_POOL);
        assert_eq!(cfg.pools[0].rejection, RejectionPolicy::CallerRuns);
    }

    #[test]
    fn test_from_json_str_parse_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
