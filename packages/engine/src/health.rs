//! `_monitor_pool_health`: three one-way latches combined with AND (§4.F.1,
//! I6, B1). Once a latch is true it never resets — a brief capacity dip
//! during stabilization must not restart the monitor.

use std::time::{Duration, Instant};

use fleet_migrate_types::{ClusterNodeMetadata, OrchestratorConnector, PoolManager};

/// Polls until either all three latches hold (returns `true`) or `deadline`
/// passes (returns `false`). `drained` is the set of nodes this chunk just
/// submitted for draining; with an empty set the `draining_happened` latch
/// is satisfied before the first poll (B1).
pub async fn monitor_pool_health(
    manager: &dyn PoolManager,
    connector: &dyn OrchestratorConnector,
    deadline: Instant,
    drained: &[ClusterNodeMetadata],
    interval: Duration,
    ignore_pod_health: bool,
) -> bool {
    let mut draining_happened = drained.is_empty();
    let mut capacity_satisfied = false;
    let mut pods_healthy = false;

    loop {
        manager.reload_state(!ignore_pod_health).await;

        if !draining_happened {
            let mut all_replaced = true;
            for node in drained {
                let current = connector.get_agent_metadata(&node.instance.ip_address).await;
                if current.agent_id == node.agent.agent_id {
                    all_replaced = false;
                    break;
                }
            }
            draining_happened = all_replaced;
        }

        if draining_happened {
            if !capacity_satisfied {
                capacity_satisfied = manager.is_capacity_satisfied().await;
            }
            if !pods_healthy {
                pods_healthy = ignore_pod_health || connector.has_enough_capacity_for_pods().await;
            }
        }

        if draining_happened && capacity_satisfied && pods_healthy {
            return true;
        }

        if Instant::now() >= deadline {
            return false;
        }

        tokio::time::sleep(interval).await;
    }
}
