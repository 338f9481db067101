//! Tests for builders

use tick_engine::builders::build_registry;
use tick_engine::config::{EngineConfig, WorkerPoolConfig, ENTITY_POOL};
use tick_engine::core::PoolError;

#[test]
fn test_build_registry_creates_every_pool() {
    let cfg = EngineConfig {
        pools: vec![
            WorkerPoolConfig::new().with_name(ENTITY_POOL).with_worker_count(2),
            WorkerPoolConfig::new().with_name("login").with_worker_count(1),
        ],
        ..EngineConfig::default()
    };
    let registry = build_registry(&cfg).unwrap();
    assert_eq!(registry.names(), vec![ENTITY_POOL.to_string(), "login".to_string()]);
    registry.shutdown();
}

#[test]
fn test_build_registry_rejects_duplicates() {
    let cfg = EngineConfig {
        pools: vec![
            WorkerPoolConfig::new().with_name(ENTITY_POOL),
            WorkerPoolConfig::new().with_name(ENTITY_POOL),
        ],
        ..EngineConfig::default()
    };
    assert!(matches!(build_registry(&cfg), Err(PoolError::InvalidConfig(_))));
}
