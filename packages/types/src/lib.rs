//! Shared data model and consumed-interface traits for the node migration core.
//!
//! These types carry no business logic of their own; they are the vocabulary
//! the drain/terminate pipelines and the migration engine share.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Orchestrator flavor a pool is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    Kubernetes,
    Mesos,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::Mesos
    }
}

/// Origin tag carried on every queue message, used to pick the resource-group
/// class and to decide mesos-specific handling on termination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Sfr,
    Asg,
    Clusterman,
    Aws2MinWarning,
    Mmb,
}

/// Why a host is being recycled; travels on the queue messages for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    ScalingDown,
    NodeMigration,
    SpotInterruption,
}

impl Default for TerminationReason {
    fn default() -> Self {
        TerminationReason::ScalingDown
    }
}

/// The unit of work flowing through the drain/terminate pipelines.
///
/// Immutable per message: a retried drain produces a new `Host` with
/// `attempt` incremented, never a mutation of the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub instance_id: String,
    pub ip: String,
    pub hostname: String,
    pub group_id: String,
    pub agent_id: String,
    pub pool: String,
    pub scheduler: Scheduler,
    pub sender: Sender,
    pub receipt_handle: String,
    pub draining_start_time: String,
    pub termination_reason: TerminationReason,
    pub attempt: u32,
}

impl Host {
    pub fn is_orphan(&self) -> bool {
        self.agent_id.is_empty()
    }
}

/// The orchestrator's view of a node's agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentMetadata {
    pub agent_id: String,
    pub task_count: u64,
}

/// The cloud provider's view of the underlying instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMetadata {
    pub market: Option<String>,
    pub weight: f64,
    pub ip_address: String,
    pub uptime: Duration,
    pub state: String,
    pub instance_type: String,
    pub kernel: Option<String>,
    pub lsbrelease: Option<String>,
}

/// The engine's reloaded-each-tick view of one live node.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNodeMetadata {
    pub agent: AgentMetadata,
    pub instance: InstanceMetadata,
}

/// Either an absolute node count or a fraction of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolPortion {
    Count(u64),
    Fraction(f64),
}

impl PoolPortion {
    /// Resolves this portion against a total pool size.
    ///
    /// Fractions round to the nearest node but never go below 1; absolute
    /// counts are clamped to the pool size.
    pub fn of(&self, total: u64) -> u64 {
        match *self {
            PoolPortion::Count(n) => n.min(total),
            PoolPortion::Fraction(frac) => {
                let raw = (total as f64 * frac).round() as u64;
                raw.max(1)
            }
        }
    }
}

/// Sort key used to order nodes before chunking a drain selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPrecedence {
    TaskCount,
    Uptime,
}

/// Typed configuration bundle the migration engine runs under, component B.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSetup {
    pub rate: PoolPortion,
    pub prescaling: Option<PoolPortion>,
    pub precedence: MigrationPrecedence,
    pub bootstrap_wait: Duration,
    pub bootstrap_timeout: Duration,
    pub disable_autoscaling: bool,
    pub expected_duration: Duration,
    pub health_check_interval: Duration,
    pub ignore_pod_health: bool,
}

/// Possible states an AWS instance can be reported in; only `running` and
/// `pending` count as "alive enough to migrate".
pub const RUNNING_STATES: &[&str] = &["running", "pending"];

/// Node-set states the engine consults — kept separate from AWS's literal
/// state strings so the core isn't coupled to one cloud vocabulary.
#[async_trait]
pub trait PoolManager: Send + Sync {
    async fn get_node_metadatas(&self, states: &[&str]) -> Vec<ClusterNodeMetadata>;
    async fn is_capacity_satisfied(&self) -> bool;
    async fn reload_state(&self, load_pods_info: bool);
    async fn submit_for_draining(&self, node: &ClusterNodeMetadata, reason: TerminationReason);
    async fn modify_target_capacity(&self, new_capacity: u64);
    fn target_capacity(&self) -> u64;
    fn has_draining_client(&self) -> bool;
    fn cluster(&self) -> &str;
    fn pool(&self) -> &str;
}

/// Orchestrator-side operations the engine needs beyond what `PoolManager`
/// exposes directly (pod scheduling pressure, label selectors).
#[async_trait]
pub trait OrchestratorConnector: Send + Sync {
    async fn get_agent_metadata(&self, ip: &str) -> AgentMetadata;
    async fn set_label_selectors(&self, selectors: &[String], add_to_existing: bool);
    async fn has_enough_capacity_for_pods(&self) -> bool;
}

/// A cloud-provider resource group (spot-fleet, autoscaling group) keyed by
/// the `Sender` tag that produced a given host.
#[async_trait]
pub trait ResourceGroup: Send + Sync {
    async fn terminate_instances_by_id(&self, instance_ids: &[String]);
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Resolves a resource group registry for a cluster/pool, keyed by
    /// group id (`sender → class → {group_id: group}`, flattened).
    async fn load(&self, cluster: &str, pool: &str) -> Vec<(String, Box<dyn ResourceGroup>)>;
}

#[async_trait]
pub trait AutoscalerToggle: Send + Sync {
    async fn disable_autoscaling(&self, cluster: &str, pool: &str, scheduler: Scheduler, until_unix: i64);
    async fn enable_autoscaling(&self, cluster: &str, pool: &str, scheduler: Scheduler);
}

/// Raised by the `OrchestratorDriver`'s drain calls (not by cordon/uncordon
/// or the mesos maintenance-schedule flush, which the spec never documents
/// as a retry trigger) — the orchestrator RPC itself failed, distinct from
/// a clean `false`/not-yet-drained result.
#[derive(Debug, thiserror::Error)]
#[error("orchestrator driver error: {0}")]
pub struct DriverError(pub String);

#[async_trait]
pub trait OrchestratorDriver: Send + Sync {
    async fn k8s_drain(&self, agent_id: &str, force: bool) -> Result<bool, DriverError>;
    async fn k8s_uncordon(&self, agent_id: &str);
    async fn mesos_drain(&self, host_ip_pairs: &[String], start_ns: u64, duration_ns: u64) -> Result<(), DriverError>;
    async fn mesos_down(&self, host_ip_pairs: &[String]);
    async fn mesos_up(&self, host_ip_pairs: &[String]);
}

pub trait Counter: Send + Sync {
    fn count(&self);
}

pub trait Timer: Send + Sync {
    fn start(&mut self);
    fn stop(&mut self);
}

pub trait Gauge: Send + Sync {
    fn set(&self, value: f64);
}

/// Abstract monitoring sink; the core never talks to a concrete metrics
/// backend directly.
pub trait MetricsSink: Send + Sync {
    fn create_counter(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Counter>;
    fn create_timer(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Timer>;
    fn create_gauge(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Gauge>;
}
