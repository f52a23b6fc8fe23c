//! The drain pipeline: pulls from the drain queue, cordons/drains via the
//! orchestrator, and forwards onward to the terminate queue.

mod error;

pub use error::DrainError;

use std::time::Duration;

use fleet_migrate_queue::{host_from_instance_id, CloudLookup, DrainingClient, DEFAULT_TERMINATE_DELAY_SECONDS};
use fleet_migrate_types::{CloudProvider, DriverError, Host, OrchestratorDriver, Scheduler};
use tracing::{info, warn};

/// Settings for the expiry/force-termination branch of the state machine.
/// These are draining-pipeline specific and not part of a migration's
/// `WorkerSetup` — they bound how long any drain, uptime- or event-driven,
/// is allowed to run before the pipeline gives up on it.
#[derive(Debug, Clone, Copy)]
pub struct DrainPipelineConfig {
    pub max_draining_time: Duration,
    pub force_termination: bool,
    pub mesos_drain_duration: Duration,
}

impl Default for DrainPipelineConfig {
    fn default() -> Self {
        DrainPipelineConfig {
            max_draining_time: Duration::from_secs(90 * 60),
            force_termination: false,
            mesos_drain_duration: Duration::from_secs(60 * 60),
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn host_label(host: &Host) -> String {
    format!("{}|{}", host.hostname, host.ip)
}

/// Processes exactly one drain-queue message, if one is available.
///
/// Every branch either forwards the host to the terminate queue, resubmits
/// it to the drain queue with an incremented attempt, or drops it — and in
/// every case deletes the originating drain message, per the always-delete
/// invariant (I2).
pub async fn process_drain_queue(
    queue: &DrainingClient,
    driver: &dyn OrchestratorDriver,
    cloud: &dyn CloudLookup,
    config: &DrainPipelineConfig,
) -> Result<(), DrainError> {
    let Some(host) = queue.get_host_to_drain().await? else {
        return Ok(());
    };

    // Hostname guard: an unnamed host cannot be cordoned safely.
    if host.hostname.is_empty() {
        queue.submit_host_for_termination(&host, 0).await?;
        queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
        return Ok(());
    }

    let now = now_unix();

    // Dedupe: a drain for this instance is already in flight.
    if queue.ttl_cache().is_fresh(&host.instance_id, now) {
        queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
        return Ok(());
    }

    // Orphan check: kubernetes node with no known agent. Re-resolve before
    // doing anything cordon-shaped, since the instance may already be gone.
    if host.scheduler == Scheduler::Kubernetes && host.is_orphan() {
        let resolved = host_from_instance_id(cloud, &host.receipt_handle, &host.instance_id).await;
        match resolved {
            None => {
                queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
            }
            Some(fresh) if fresh.agent_id.is_empty() => {
                queue.submit_host_for_termination(&fresh, 0).await?;
                queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
            }
            Some(fresh) => {
                queue.submit_host_for_draining(&fresh, 0, host.attempt + 1).await?;
                queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
            }
        }
        return Ok(());
    }

    // Expiry.
    let elapsed = chrono::DateTime::parse_from_rfc3339(&host.draining_start_time)
        .map(|start| now - start.timestamp())
        .unwrap_or(0);
    if elapsed > config.max_draining_time.as_secs() as i64 {
        match host.scheduler {
            Scheduler::Kubernetes => {
                if config.force_termination {
                    queue.submit_host_for_termination(&host, 0).await?;
                } else {
                    warn!(instance_id = %host.instance_id, "draining expired, uncordoning and giving up");
                    driver.k8s_uncordon(&host.agent_id).await;
                }
            }
            Scheduler::Mesos => {
                queue.submit_host_for_termination(&host, 0).await?;
            }
        }
        queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
        return Ok(());
    }

    // Drain. On a driver exception (distinct from a clean "not drained yet"
    // result), the host is resubmitted with an incremented attempt exactly
    // like a failed drain, so the attempt counter stays observable (§4.D
    // step 7, §7 error kind 2).
    match host.scheduler {
        Scheduler::Mesos => {
            let start_ns = (now as u64) * 1_000_000_000;
            match driver.mesos_drain(&[host_label(&host)], start_ns, config.mesos_drain_duration.as_nanos() as u64).await {
                Ok(()) => {
                    queue.submit_host_for_termination(&host, DEFAULT_TERMINATE_DELAY_SECONDS).await?;
                }
                Err(err) => {
                    warn!(instance_id = %host.instance_id, error = %err, "mesos drain raised, resubmitting with incremented attempt");
                    queue.submit_host_for_draining(&host, 0, host.attempt + 1).await?;
                }
            }
        }
        Scheduler::Kubernetes => match driver.k8s_drain(&host.agent_id, false).await {
            Ok(true) => {
                queue.submit_host_for_termination(&host, 0).await?;
            }
            Ok(false) => {
                queue.submit_host_for_draining(&host, 0, host.attempt + 1).await?;
            }
            Err(err) => {
                warn!(instance_id = %host.instance_id, error = %err, "k8s drain raised, resubmitting with incremented attempt");
                queue.submit_host_for_draining(&host, 0, host.attempt + 1).await?;
            }
        },
    }

    queue.ttl_cache().insert(&host.instance_id, now);
    queue.delete_drain_messages(std::slice::from_ref(&host)).await?;
    info!(instance_id = %host.instance_id, "drain message processed");
    Ok(())
}

/// Reads one warning event (e.g. a spot-interruption notice), resolves it
/// to a host, and places it on the drain queue if its resource group is
/// still one the registry knows about.
pub async fn process_warning_queue(
    queue: &DrainingClient,
    cloud: &dyn CloudLookup,
    registry: &dyn CloudProvider,
    cluster: &str,
    pool: &str,
) -> Result<(), DrainError> {
    let Some(host) = queue.get_warned_host(cloud).await? else {
        return Ok(());
    };
    let groups = registry.load(cluster, pool).await;
    if groups.iter().any(|(group_id, _)| group_id == &host.group_id) {
        queue.submit_host_for_draining(&host, 0, host.attempt).await?;
    } else {
        warn!(group_id = %host.group_id, "warned host belongs to an unknown resource group, dropping");
    }
    queue.delete_warning_messages(std::slice::from_ref(&host)).await?;
    Ok(())
}
