//! Named pool registry.
//!
//! Every pool the server needs is created once by [`PoolRegistry::init`] and
//! torn down once by [`PoolRegistry::shutdown`]. Callers hold `Arc<WorkerPool>`
//! handles obtained from [`PoolRegistry::get`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::WorkerPoolConfig;

use super::worker_pool::{PoolError, PoolStats, WorkerPool};

/// The set of pools created at startup.
#[derive(Debug)]
pub struct PoolRegistry {
    pools: BTreeMap<String, Arc<WorkerPool>>,
    shut_down: AtomicBool,
}

impl PoolRegistry {
    /// Build every pool in `configs`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` for an invalid or duplicate pool
    /// - `PoolError::Spawn` if a prestarted worker cannot be created
    ///
    /// Pools built before the failure are shut down again.
    pub fn init<I>(configs: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = WorkerPoolConfig>,
    {
        let mut registry = Self {
            pools: BTreeMap::new(),
            shut_down: AtomicBool::new(false),
        };
        for config in configs {
            if registry.pools.contains_key(&config.name) {
                let err = PoolError::InvalidConfig(format!(
                    "pool `{}` defined more than once",
                    config.name
                ));
                registry.shutdown();
                return Err(err);
            }
            let name = config.name.clone();
            match WorkerPool::new(config) {
                Ok(pool) => {
                    registry.pools.insert(name, Arc::new(pool));
                }
                Err(e) => {
                    registry.shutdown();
                    return Err(e);
                }
            }
        }
        info!(pools = ?registry.names(), "pool registry initialized");
        Ok(registry)
    }

    /// Handle to a pool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<WorkerPool>> {
        self.pools.get(name).cloned()
    }

    /// Handle to a pool that must exist.
    ///
    /// # Errors
    ///
    /// `PoolError::UnknownPool` when no pool has this name.
    pub fn require(&self, name: &str) -> Result<Arc<WorkerPool>, PoolError> {
        self.get(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_string()))
    }

    /// Registered pool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.pools.keys().cloned().collect()
    }

    /// Stats for every pool, sorted by name.
    #[must_use]
    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools.values().map(|pool| pool.stats()).collect()
    }

    /// Whether [`PoolRegistry::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Shut down every pool, draining accepted work. Runs once; later calls
    /// return immediately.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for pool in self.pools.values() {
            pool.shutdown();
        }
        info!(pools = self.pools.len(), "pool registry shut down");
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RejectionReason;

    fn configs() -> Vec<WorkerPoolConfig> {
        vec![
            WorkerPoolConfig::new().with_name("entity-update").with_worker_count(2),
            WorkerPoolConfig::new().with_name("io").with_worker_count(1),
        ]
    }

    #[test]
    fn test_init_and_get() {
        let registry = PoolRegistry::init(configs()).unwrap();
        assert_eq!(registry.names(), vec!["entity-update".to_string(), "io".to_string()]);
        assert!(registry.get("io").is_some());
        assert!(registry.get("net").is_none());
        assert!(matches!(
            registry.require("net"),
            Err(PoolError::UnknownPool(name)) if name == "net"
        ));
        registry.shutdown();
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut cfgs = configs();
        cfgs.push(WorkerPoolConfig::new().with_name("io"));
        let err = PoolRegistry::init(cfgs).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn test_shutdown_once_rejects_later_work() {
        let registry = PoolRegistry::init(configs()).unwrap();
        let io = registry.get("io").unwrap();
        registry.shutdown();
        registry.shutdown();
        assert!(registry.is_shut_down());

        let err = io.execute(|| {}).unwrap_err();
        assert_eq!(
            err,
            PoolError::Rejected {
                pool: "io".into(),
                reason: RejectionReason::ShutDown,
            }
        );
    }

    #[test]
    fn test_stats_for_all_pools() {
        let registry = PoolRegistry::init(configs()).unwrap();
        let stats = registry.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "entity-update");
        assert_eq!(stats[1].worker_count, 1);
    }
}
