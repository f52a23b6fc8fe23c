//! Uptime worker (§4.F.3): continuously recycles nodes older than a
//! threshold, one pool at a time, forever until told to stop.

use std::time::Duration;

use fleet_migrate_types::{MetricsSink, OrchestratorConnector, PoolManager, WorkerSetup};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::pool_lock::PoolLockRegistry;
use crate::selection::drain_node_selection;

pub const UPTIME_CHECK_INTERVAL_SECONDS: u64 = 3600;

/// Runs until `stop` is notified. Each iteration checks pool capacity, and
/// if satisfied, acquires the pool lock and drains nodes whose uptime
/// exceeds `uptime_threshold`.
pub async fn run_uptime_worker(
    manager: &dyn PoolManager,
    connector: &dyn OrchestratorConnector,
    metrics: &dyn MetricsSink,
    pool_lock: &PoolLockRegistry,
    setup: &WorkerSetup,
    uptime_threshold: Duration,
    check_interval: Duration,
    stop: &Notify,
) {
    if !manager.has_draining_client() {
        warn!(cluster = manager.cluster(), pool = manager.pool(), "pool has no draining client configured, not starting uptime worker");
        return;
    }

    loop {
        if manager.is_capacity_satisfied().await {
            let _guard = pool_lock.acquire(manager.cluster(), manager.pool()).await;
            drain_node_selection(manager, connector, metrics, |n| n.instance.uptime > uptime_threshold, setup).await;
        } else {
            info!(cluster = manager.cluster(), pool = manager.pool(), "pool underprovisioned, skipping uptime pass");
        }

        tokio::select! {
            _ = tokio::time::sleep(check_interval) => {}
            _ = stop.notified() => return,
        }

        manager.reload_state(!setup.ignore_pod_health).await;
    }
}
