//! Builders to construct worker pools from configuration.

use crate::config::EngineConfig;
use crate::core::{PoolError, PoolRegistry};

/// Build the pool registry described by `cfg`.
///
/// # Errors
///
/// - `PoolError::InvalidConfig` if the engine configuration does not validate
/// - `PoolError::Spawn` if a prestarted worker cannot be created
pub fn build_registry(cfg: &EngineConfig) -> Result<PoolRegistry, PoolError> {
    cfg.validate()
        .map_err(|e| PoolError::InvalidConfig(format!("config invalid: {e}")))?;

    PoolRegistry::init(cfg.pools.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENTITY_POOL, IO_POOL};

    #[test]
    fn test_build_registry_from_defaults() {
        let registry = build_registry(&EngineConfig::default()).unwrap();
        assert!(registry.get(ENTITY_POOL).is_some());
        assert!(registry.get(IO_POOL).is_some());
        registry.shutdown();
    }

    #[test]
    fn test_build_registry_rejects_invalid_config() {
        let mut cfg = EngineConfig::default();
        cfg.heartbeat.period_ms = 0;
        let err = build_registry(&cfg).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(msg) if msg.starts_with("config invalid")));
    }
}
