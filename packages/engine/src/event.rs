//! Event worker (§4.F.4): a one-shot migration run for nodes failing a
//! declarative condition. Pool lock and autoscaler state are always
//! unwound in reverse order, success or failure.

use std::time::{Duration, Instant};

use fleet_migrate_condition::MigrationEvent;
use fleet_migrate_types::{
    AutoscalerToggle, ClusterNodeMetadata, MetricsSink, OrchestratorConnector, PoolManager, Scheduler, WorkerSetup,
    RUNNING_STATES,
};
use tracing::info;

use crate::error::EngineError;
use crate::health::monitor_pool_health;
use crate::pool_lock::PoolLockRegistry;
use crate::selection::drain_node_selection;

pub const INITIAL_POOL_HEALTH_TIMEOUT_SECONDS: u64 = 900;

/// Runs one event-driven migration to completion (or failure). `scheduler`
/// is only used for the autoscaler-toggle calls, which are keyed by it.
pub async fn run_event_worker(
    manager: &dyn PoolManager,
    connector: &dyn OrchestratorConnector,
    autoscaler: &dyn AutoscalerToggle,
    metrics: &dyn MetricsSink,
    pool_lock: &PoolLockRegistry,
    setup: &WorkerSetup,
    event: &MigrationEvent,
    scheduler: Scheduler,
) -> Result<(), EngineError> {
    connector.set_label_selectors(&event.label_selectors, true).await;
    manager.reload_state(!setup.ignore_pod_health).await;

    let cluster = manager.cluster().to_string();
    let pool = manager.pool().to_string();

    let Some(guard) = pool_lock.acquire_with_timeout(&cluster, &pool, setup.expected_duration).await else {
        return Err(EngineError::LockTimeout { cluster, pool, timeout_secs: setup.expected_duration.as_secs() });
    };

    if setup.disable_autoscaling {
        let until = chrono::Utc::now().timestamp() + setup.expected_duration.as_secs() as i64;
        autoscaler.disable_autoscaling(&cluster, &pool, scheduler, until).await;
    }

    let result = run_migration_body(manager, connector, metrics, setup, event, &cluster, &pool).await;

    // Unwind in reverse order of acquisition: release the lock first, then
    // re-enable the autoscaler. Pre-scaled capacity is deliberately left in
    // place; the autoscaler is trusted to normalize it.
    drop(guard);
    if setup.disable_autoscaling {
        autoscaler.enable_autoscaling(&cluster, &pool, scheduler).await;
    }

    result
}

async fn run_migration_body(
    manager: &dyn PoolManager,
    connector: &dyn OrchestratorConnector,
    metrics: &dyn MetricsSink,
    setup: &WorkerSetup,
    event: &MigrationEvent,
    cluster: &str,
    pool: &str,
) -> Result<(), EngineError> {
    if let Some(prescaling) = setup.prescaling {
        let nodes = manager.get_node_metadatas(RUNNING_STATES).await;
        if !nodes.is_empty() {
            let avg_weight = nodes.iter().map(|n| n.instance.weight).sum::<f64>() / nodes.len() as f64;
            let offset = prescaling.of(nodes.len() as u64);
            let new_capacity = (manager.target_capacity() as f64 + offset as f64 * avg_weight).round() as u64;
            info!(cluster, pool, new_capacity, "prescaling pool ahead of migration");
            manager.modify_target_capacity(new_capacity).await;
        }
    }

    let initial_deadline = Instant::now() + Duration::from_secs(INITIAL_POOL_HEALTH_TIMEOUT_SECONDS);
    let initially_healthy =
        monitor_pool_health(manager, connector, initial_deadline, &[], setup.health_check_interval, true).await;
    if !initially_healthy {
        return Err(EngineError::InitialHealthTimeout {
            cluster: cluster.to_string(),
            pool: pool.to_string(),
            timeout_secs: INITIAL_POOL_HEALTH_TIMEOUT_SECONDS,
        });
    }

    let selector = |node: &ClusterNodeMetadata| event.targets(node);
    match tokio::time::timeout(setup.expected_duration, drain_node_selection(manager, connector, metrics, selector, setup)).await
    {
        Err(_elapsed) => Err(EngineError::BudgetExceeded {
            cluster: cluster.to_string(),
            pool: pool.to_string(),
            budget_secs: setup.expected_duration.as_secs(),
        }),
        Ok(false) => Err(EngineError::SelectionFailed { cluster: cluster.to_string(), pool: pool.to_string() }),
        Ok(true) => Ok(()),
    }
}
