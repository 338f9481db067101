//! Tests for error types

use tick_engine::core::{
    ChainError, ConfigError, EntityFault, EntityId, EntityKind, FaultDisposition, PoolError,
    RejectionReason,
};

#[test]
fn test_chain_errors() {
    assert_eq!(
        format!("{}", ChainError::Running),
        "cannot append to a running chain"
    );
    assert_eq!(
        format!("{}", ChainError::InvalidDelay(0)),
        "chain link delay must be at least 1 tick, got 0"
    );
    assert_eq!(format!("{}", ChainError::Empty), "cannot run an empty chain");
    assert_eq!(
        format!("{}", ChainError::AlreadyRunning),
        "chain is already running"
    );
}

#[test]
fn test_entity_fault_display_and_disposition() {
    let fault = EntityFault {
        entity: EntityId(12),
        kind: EntityKind::Player,
        message: "panicked: bad packet".to_string(),
    };
    assert_eq!(
        format!("{fault}"),
        "player entity 12 update failed: panicked: bad packet"
    );
    assert_eq!(fault.disposition(), FaultDisposition::Disconnect);

    let fault = EntityFault {
        kind: EntityKind::Npc,
        ..fault
    };
    assert_eq!(fault.disposition(), FaultDisposition::Remove);
}

#[test]
fn test_pool_rejection_error() {
    let err = PoolError::Rejected {
        pool: "entity-update".to_string(),
        reason: RejectionReason::QueueFull,
    };
    assert_eq!(
        format!("{err}"),
        "task rejected by pool `entity-update`: no space in work queue"
    );
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::Env {
        var: "TICK_PERIOD_MS",
        value: "fast".to_string(),
    };
    assert_eq!(format!("{err}"), "invalid value for TICK_PERIOD_MS: fast");

    let err = ConfigError::Invalid("no pools".to_string());
    assert_eq!(format!("{err}"), "invalid configuration: no pools");
}

#[test]
fn test_pool_error_is_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(PoolError::UnknownPool("io".to_string()));
    assert_eq!(err.to_string(), "no pool named `io`");
}
