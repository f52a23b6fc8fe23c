use async_trait::async_trait;
use fleet_migrate_types::{Host, Scheduler, Sender, TerminationReason};

use crate::error::QueueError;

/// The subset of an EC2 `describe-instances` result the orphan-resolution
/// path needs.
#[derive(Debug, Clone)]
pub struct InstanceDescription {
    pub private_ip: String,
    /// The orchestrator-side identity the original system carries as the
    /// instance's private DNS name; used verbatim as `agent_id`.
    pub private_dns_name: String,
    pub tags: Vec<(String, String)>,
}

#[async_trait]
pub trait CloudLookup: Send + Sync {
    /// Describes an instance. Returns `Ok(vec![])` for "no such instance"
    /// and `Err` only for a genuine provider-side failure.
    async fn describe_instances(&self, instance_id: &str) -> Result<Vec<InstanceDescription>, QueueError>;

    async fn resolve_hostname(&self, ip: &str) -> Result<String, QueueError>;
}

const FLEET_REQUEST_TAG: &str = "aws:ec2spot:fleet-request-id";
const ASG_NAME_TAG: &str = "aws:autoscaling:groupName";
const KUBERNETES_CLUSTER_TAG: &str = "KubernetesCluster";

/// Re-resolves a bare `instance_id` into a full `Host` via a cloud describe
/// call, used both for spot-interruption warnings and for orphaned drain
/// messages whose orchestrator agent has vanished.
///
/// Returns `None` whenever the instance can't be confidently resolved:
/// no such instance, no tags yet (too new), tags identify neither a
/// spot-fleet nor an autoscaling-group origin, DNS resolution fails, or the
/// describe call itself errors.
pub async fn host_from_instance_id(
    cloud: &dyn CloudLookup,
    receipt_handle: &str,
    instance_id: &str,
) -> Option<Host> {
    let instances = cloud.describe_instances(instance_id).await.unwrap_or_default();
    let instance = instances.into_iter().next()?;
    if instance.tags.is_empty() {
        return None;
    }

    let fleet_request = instance.tags.iter().find(|(k, _)| k == FLEET_REQUEST_TAG).map(|(_, v)| v.clone());
    let asg_name = instance.tags.iter().find(|(k, _)| k == ASG_NAME_TAG).map(|(_, v)| v.clone());

    let (sender, group_id, scheduler) = if let Some(group_id) = fleet_request {
        (Sender::Sfr, group_id, Scheduler::Mesos)
    } else if let Some(group_id) = asg_name {
        let scheduler = if instance.tags.iter().any(|(k, _)| k == KUBERNETES_CLUSTER_TAG) {
            Scheduler::Kubernetes
        } else {
            Scheduler::Mesos
        };
        (Sender::Asg, group_id, scheduler)
    } else {
        return None;
    };

    let hostname = cloud.resolve_hostname(&instance.private_ip).await.ok()?;

    Some(Host {
        instance_id: instance_id.to_string(),
        ip: instance.private_ip,
        hostname,
        group_id,
        agent_id: instance.private_dns_name,
        pool: String::new(),
        scheduler,
        sender,
        receipt_handle: receipt_handle.to_string(),
        draining_start_time: chrono::Utc::now().to_rfc3339(),
        termination_reason: TerminationReason::SpotInterruption,
        attempt: 1,
    })
}
