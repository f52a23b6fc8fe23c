//! Per-`(cluster, pool)` mutual exclusion between the uptime worker and
//! event workers (I1): at most one migration actor drains a given pool at
//! any instant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one migration actor's access to a pool. Dropping
/// it releases the lock for the next contender.
pub type PoolLockGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct PoolLockRegistry {
    locks: StdMutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl PoolLockRegistry {
    pub fn new() -> Self {
        PoolLockRegistry::default()
    }

    fn lock_for(&self, cluster: &str, pool: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry((cluster.to_string(), pool.to_string())).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Blocks until the lock for `(cluster, pool)` is free, no timeout.
    /// Used by the uptime worker, which is happy to wait indefinitely.
    pub async fn acquire(&self, cluster: &str, pool: &str) -> PoolLockGuard {
        self.lock_for(cluster, pool).lock_owned().await
    }

    /// Attempts to acquire the lock within `timeout`; `None` on expiry. Used
    /// by event workers, which must not deadlock behind a long uptime pass.
    pub async fn acquire_with_timeout(&self, cluster: &str, pool: &str, timeout: Duration) -> Option<PoolLockGuard> {
        let lock = self.lock_for(cluster, pool);
        tokio::time::timeout(timeout, lock.lock_owned()).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_first_holds_lock() {
        let registry = PoolLockRegistry::new();
        let guard = registry.acquire("c1", "p1").await;
        let second = registry.acquire_with_timeout("c1", "p1", Duration::from_millis(20)).await;
        assert!(second.is_none());
        drop(guard);
        let third = registry.acquire_with_timeout("c1", "p1", Duration::from_millis(20)).await;
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn distinct_pools_do_not_contend() {
        let registry = PoolLockRegistry::new();
        let _g1 = registry.acquire("c1", "p1").await;
        let g2 = registry.acquire_with_timeout("c1", "p2", Duration::from_millis(20)).await;
        assert!(g2.is_some());
    }
}
