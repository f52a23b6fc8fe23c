//! `_drain_node_selection`: pick a precedence-sorted subset of a pool and
//! drain it in sequential, health-gated chunks (§4.F.2, §9 sort-and-chunk).

use std::time::Instant;

use fleet_migrate_types::{
    ClusterNodeMetadata, MetricsSink, MigrationPrecedence, OrchestratorConnector, PoolManager, TerminationReason,
    WorkerSetup, RUNNING_STATES,
};
use tracing::info;

use crate::health::monitor_pool_health;

fn sort_by_precedence(nodes: &mut [ClusterNodeMetadata], precedence: MigrationPrecedence) {
    match precedence {
        MigrationPrecedence::TaskCount => {
            nodes.sort_by(|a, b| a.agent.task_count.cmp(&b.agent.task_count).then_with(|| a.agent.agent_id.cmp(&b.agent.agent_id)))
        }
        MigrationPrecedence::Uptime => nodes.sort_by(|a, b| b.instance.uptime.cmp(&a.instance.uptime)),
    }
}

/// Selects nodes matching `selector`, sorts them by `setup.precedence`, and
/// drains them in chunks sized against the *total* pool (not the filtered
/// selection). Returns `false` as soon as a chunk fails its health gate,
/// without attempting later chunks.
pub async fn drain_node_selection<F>(
    manager: &dyn PoolManager,
    connector: &dyn OrchestratorConnector,
    metrics: &dyn MetricsSink,
    selector: F,
    setup: &WorkerSetup,
) -> bool
where
    F: Fn(&ClusterNodeMetadata) -> bool,
{
    let total = manager.get_node_metadatas(RUNNING_STATES).await;
    let mut selected: Vec<ClusterNodeMetadata> = total.iter().filter(|n| selector(n)).cloned().collect();
    if selected.is_empty() {
        return true;
    }
    sort_by_precedence(&mut selected, setup.precedence);

    let chunk_size = (setup.rate.of(total.len() as u64) as usize).max(1);

    for chunk in selected.chunks(chunk_size) {
        let chunk_start = Instant::now();

        for node in chunk {
            manager.submit_for_draining(node, TerminationReason::NodeMigration).await;
            metrics.create_counter("node_migration.drain_count", &[("pool", manager.pool())]).count();
            metrics
                .create_gauge("node_migration.drained_node_uptime", &[("pool", manager.pool())])
                .set(node.instance.uptime.as_secs_f64());
            info!(cluster = manager.cluster(), pool = manager.pool(), agent_id = %node.agent.agent_id, "submitted node for draining");
        }

        tokio::time::sleep(setup.bootstrap_wait).await;

        let deadline = chunk_start + setup.bootstrap_timeout;
        let healthy = monitor_pool_health(manager, connector, deadline, chunk, setup.health_check_interval, setup.ignore_pod_health).await;
        if !healthy {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_migrate_types::{AgentMetadata, Counter, Gauge, InstanceMetadata, Timer};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingManager {
        nodes: Vec<ClusterNodeMetadata>,
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PoolManager for RecordingManager {
        async fn get_node_metadatas(&self, _states: &[&str]) -> Vec<ClusterNodeMetadata> {
            self.nodes.clone()
        }
        async fn is_capacity_satisfied(&self) -> bool {
            true
        }
        async fn reload_state(&self, _load_pods_info: bool) {}
        async fn submit_for_draining(&self, node: &ClusterNodeMetadata, _reason: TerminationReason) {
            self.submitted.lock().unwrap().push(node.agent.agent_id.clone());
        }
        async fn modify_target_capacity(&self, _new_capacity: u64) {}
        fn target_capacity(&self) -> u64 {
            self.nodes.len() as u64
        }
        fn has_draining_client(&self) -> bool {
            true
        }
        fn cluster(&self) -> &str {
            "c1"
        }
        fn pool(&self) -> &str {
            "p1"
        }
    }

    struct AlwaysHealthyConnector;
    #[async_trait]
    impl OrchestratorConnector for AlwaysHealthyConnector {
        async fn get_agent_metadata(&self, _ip: &str) -> AgentMetadata {
            AgentMetadata { agent_id: "replaced".to_string(), task_count: 0 }
        }
        async fn set_label_selectors(&self, _selectors: &[String], _add_to_existing: bool) {}
        async fn has_enough_capacity_for_pods(&self) -> bool {
            true
        }
    }

    struct NoopCounter;
    impl Counter for NoopCounter {
        fn count(&self) {}
    }
    struct NoopTimer;
    impl Timer for NoopTimer {
        fn start(&mut self) {}
        fn stop(&mut self) {}
    }
    struct NoopGauge;
    impl Gauge for NoopGauge {
        fn set(&self, _value: f64) {}
    }
    struct NoopMetrics;
    impl MetricsSink for NoopMetrics {
        fn create_counter(&self, _name: &str, _tags: &[(&str, &str)]) -> Box<dyn Counter> {
            Box::new(NoopCounter)
        }
        fn create_timer(&self, _name: &str, _tags: &[(&str, &str)]) -> Box<dyn Timer> {
            Box::new(NoopTimer)
        }
        fn create_gauge(&self, _name: &str, _tags: &[(&str, &str)]) -> Box<dyn Gauge> {
            Box::new(NoopGauge)
        }
    }

    fn node(agent_id: &str, task_count: u64, uptime_secs: u64) -> ClusterNodeMetadata {
        ClusterNodeMetadata {
            agent: AgentMetadata { agent_id: agent_id.to_string(), task_count },
            instance: InstanceMetadata {
                market: None,
                weight: 1.0,
                ip_address: format!("10.0.0.{agent_id}"),
                uptime: Duration::from_secs(uptime_secs),
                state: "running".to_string(),
                instance_type: "m5.large".to_string(),
                kernel: None,
                lsbrelease: None,
            },
        }
    }

    fn setup(rate: fleet_migrate_types::PoolPortion) -> WorkerSetup {
        WorkerSetup {
            rate,
            prescaling: None,
            precedence: MigrationPrecedence::TaskCount,
            bootstrap_wait: Duration::from_millis(1),
            bootstrap_timeout: Duration::from_millis(200),
            disable_autoscaling: false,
            expected_duration: Duration::from_secs(3600),
            health_check_interval: Duration::from_millis(5),
            ignore_pod_health: true,
        }
    }

    #[tokio::test]
    async fn empty_selection_returns_true_without_submitting() {
        let manager = RecordingManager { nodes: vec![], submitted: Mutex::new(vec![]) };
        let healthy = drain_node_selection(
            &manager,
            &AlwaysHealthyConnector,
            &NoopMetrics,
            |_| true,
            &setup(fleet_migrate_types::PoolPortion::Count(2)),
        )
        .await;
        assert!(healthy);
        assert!(manager.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submits_in_task_count_order_chunked_by_rate() {
        let nodes = vec![node("6", 20, 8_000), node("5", 22, 9_000), node("4", 24, 17_000), node("3", 26, 18_000)];
        let manager = RecordingManager { nodes, submitted: Mutex::new(vec![]) };
        let healthy = drain_node_selection(
            &manager,
            &AlwaysHealthyConnector,
            &NoopMetrics,
            |_| true,
            &setup(fleet_migrate_types::PoolPortion::Count(2)),
        )
        .await;
        assert!(healthy);
        assert_eq!(*manager.submitted.lock().unwrap(), vec!["6", "5", "4", "3"]);
    }

    struct UnhealthyConnector {
        calls: AtomicU32,
    }
    #[async_trait]
    impl OrchestratorConnector for UnhealthyConnector {
        async fn get_agent_metadata(&self, _ip: &str) -> AgentMetadata {
            // Always reports the original agent still present at the IP, so the
            // "has this node been replaced" latch never flips.
            self.calls.fetch_add(1, Ordering::SeqCst);
            AgentMetadata { agent_id: "a".to_string(), task_count: 0 }
        }
        async fn set_label_selectors(&self, _selectors: &[String], _add_to_existing: bool) {}
        async fn has_enough_capacity_for_pods(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn stops_after_first_chunk_fails_health_gate() {
        let nodes = vec![node("a", 1, 1), node("b", 2, 1)];
        let manager = RecordingManager { nodes, submitted: Mutex::new(vec![]) };
        let connector = UnhealthyConnector { calls: AtomicU32::new(0) };
        let mut s = setup(fleet_migrate_types::PoolPortion::Count(1));
        s.bootstrap_timeout = Duration::from_millis(10);
        let healthy = drain_node_selection(&manager, &connector, &NoopMetrics, |_| true, &s).await;
        assert!(!healthy);
        assert_eq!(*manager.submitted.lock().unwrap(), vec!["a"]);
    }
}
