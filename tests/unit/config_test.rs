//! Tests for configuration validation

use std::time::Duration;

use tick_engine::config::{
    EngineConfig, RejectionPolicy, ThreadPriority, WorkerPoolConfig, ENTITY_POOL, IO_POOL,
};
use tick_engine::core::ConfigError;

#[test]
fn test_default_engine_config() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());

    let entity = cfg.pool(ENTITY_POOL).unwrap();
    assert_eq!(entity.rejection, RejectionPolicy::CallerRuns);
    assert_eq!(entity.advisory_priority, ThreadPriority::High);
    assert!(entity.prestart);

    let io = cfg.pool(IO_POOL).unwrap();
    assert_eq!(io.idle_timeout(), Some(Duration::from_secs(60)));
    assert_eq!(io.advisory_priority, ThreadPriority::Low);
}

#[test]
fn test_worker_pool_config_validation() {
    assert!(WorkerPoolConfig::new().validate().is_ok());
    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
    assert!(WorkerPoolConfig::new()
        .with_max_queue_depth(0)
        .validate()
        .is_err());
}

#[test]
fn test_invalid_pool_named_in_error() {
    let cfg = EngineConfig {
        pools: vec![
            WorkerPoolConfig::new().with_name(ENTITY_POOL),
            WorkerPoolConfig::new().with_name("io").with_worker_count(0),
        ],
        ..EngineConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("pool `io` invalid"));
}

#[test]
fn test_json_roundtrip_preserves_policy() {
    let cfg = EngineConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    let parsed = EngineConfig::from_json_str(&json).unwrap();
    assert_eq!(parsed, cfg);
}

#[test]
fn test_json_missing_entity_pool() {
    let err = EngineConfig::from_json_str(
        r#"{"pools": [{"name": "io", "worker_count": 1, "max_queue_depth": 8}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("entity pool")));
}
