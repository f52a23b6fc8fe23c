//! The terminate pipeline: pulls from the terminate queue, calls the
//! resource-group class to destroy the instance in the cloud, and
//! optionally flushes the mesos maintenance schedule.

mod error;

pub use error::TerminateError;

use fleet_migrate_queue::DrainingClient;
use fleet_migrate_types::{CloudProvider, OrchestratorDriver, Scheduler};
use tracing::{info, warn};

fn host_label(hostname: &str, ip: &str) -> String {
    format!("{hostname}|{ip}")
}

/// Processes exactly one terminate-queue message, if one is available.
/// Termination is the terminal stage: the message is deleted unconditionally
/// once this runs, since the cloud layer treats a duplicate terminate as
/// idempotent.
pub async fn process_termination_queue(
    queue: &DrainingClient,
    registry: &dyn CloudProvider,
    driver: &dyn OrchestratorDriver,
    cluster: &str,
) -> Result<(), TerminateError> {
    let Some(host) = queue.get_host_to_terminate().await? else {
        return Ok(());
    };

    let groups = registry.load(cluster, &host.pool).await;
    match groups.into_iter().find(|(group_id, _)| group_id == &host.group_id) {
        Some((_, group)) => group.terminate_instances_by_id(&[host.instance_id.clone()]).await,
        None => warn!(
            instance_id = %host.instance_id,
            group_id = %host.group_id,
            "no resource group registered for terminate host, treating as already gone"
        ),
    }

    if !host.hostname.is_empty() && host.scheduler == Scheduler::Mesos {
        let label = host_label(&host.hostname, &host.ip);
        driver.mesos_down(&[label.clone()]).await;
        driver.mesos_up(&[label]).await;
    }

    queue.delete_terminate_messages(std::slice::from_ref(&host)).await?;
    info!(instance_id = %host.instance_id, "terminate message processed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_migrate_queue::{QueueError, QueueTransport, RawMessage, SendMessageRequest, DEFAULT_DRAIN_CACHE_SECONDS};
    use fleet_migrate_types::{ResourceGroup, Sender};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeTransport {
        inbox: Mutex<std::collections::HashMap<String, VecDeque<RawMessage>>>,
        deleted: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            FakeTransport { inbox: Mutex::new(Default::default()), deleted: Mutex::new(vec![]) }
        }
        fn push(&self, queue: &str, msg: RawMessage) {
            self.inbox.lock().unwrap().entry(queue.to_string()).or_default().push_back(msg);
        }
    }

    #[async_trait]
    impl QueueTransport for FakeTransport {
        async fn send_message(&self, _request: SendMessageRequest) -> Result<String, QueueError> {
            Ok("id".into())
        }
        async fn receive_message(&self, queue_url: &str) -> Result<Option<RawMessage>, QueueError> {
            Ok(self.inbox.lock().unwrap().get_mut(queue_url).and_then(|q| q.pop_front()))
        }
        async fn delete_message(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
            self.deleted.lock().unwrap().push(receipt_handle.to_string());
            Ok(())
        }
    }

    struct CountingResourceGroup {
        calls: Mutex<u32>,
    }
    #[async_trait]
    impl ResourceGroup for CountingResourceGroup {
        async fn terminate_instances_by_id(&self, _ids: &[String]) {
            *self.calls.lock().unwrap() += 1;
        }
    }

    struct FakeRegistry;
    #[async_trait]
    impl CloudProvider for FakeRegistry {
        async fn load(&self, _cluster: &str, _pool: &str) -> Vec<(String, Box<dyn ResourceGroup>)> {
            vec![("sfr1".to_string(), Box::new(CountingResourceGroup { calls: Mutex::new(0) }))]
        }
    }

    struct FakeDriver {
        down_calls: Mutex<u32>,
        up_calls: Mutex<u32>,
    }
    #[async_trait]
    impl OrchestratorDriver for FakeDriver {
        async fn k8s_drain(&self, _agent_id: &str, _force: bool) -> Result<bool, fleet_migrate_types::DriverError> {
            Ok(true)
        }
        async fn k8s_uncordon(&self, _agent_id: &str) {}
        async fn mesos_drain(&self, _hosts: &[String], _start_ns: u64, _duration_ns: u64) -> Result<(), fleet_migrate_types::DriverError> {
            Ok(())
        }
        async fn mesos_down(&self, _hosts: &[String]) {
            *self.down_calls.lock().unwrap() += 1;
        }
        async fn mesos_up(&self, _hosts: &[String]) {
            *self.up_calls.lock().unwrap() += 1;
        }
    }

    fn push_host(transport: &FakeTransport, hostname: &str, scheduler: &str) {
        transport.push(
            "terminate-url",
            RawMessage {
                receipt_handle: "r1".into(),
                body: serde_json::json!({
                    "instance_id": "i123", "ip": "10.1.1.1", "hostname": hostname, "group_id": "sfr1",
                    "pool": "default", "agent_id": "agt123", "scheduler": scheduler,
                    "draining_start_time": chrono::Utc::now().to_rfc3339(),
                })
                .to_string(),
                sender: Some(Sender::Mmb),
            },
        );
    }

    #[tokio::test]
    async fn mesos_host_with_hostname_flushes_maintenance_schedule() {
        let transport = FakeTransport::new();
        push_host(&transport, "host1", "mesos");
        let queue = DrainingClient::new("mesos-test", Box::new(transport), "drain-url", "terminate-url", None, DEFAULT_DRAIN_CACHE_SECONDS);
        let driver = FakeDriver { down_calls: Mutex::new(0), up_calls: Mutex::new(0) };
        process_termination_queue(&queue, &FakeRegistry, &driver, "mesos-test").await.unwrap();
        assert_eq!(*driver.down_calls.lock().unwrap(), 1);
        assert_eq!(*driver.up_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unnamed_host_skips_maintenance_flush() {
        let transport = FakeTransport::new();
        push_host(&transport, "", "mesos");
        let queue = DrainingClient::new("mesos-test", Box::new(transport), "drain-url", "terminate-url", None, DEFAULT_DRAIN_CACHE_SECONDS);
        let driver = FakeDriver { down_calls: Mutex::new(0), up_calls: Mutex::new(0) };
        process_termination_queue(&queue, &FakeRegistry, &driver, "mesos-test").await.unwrap();
        assert_eq!(*driver.down_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn kubernetes_host_never_flushes_mesos_maintenance() {
        let transport = FakeTransport::new();
        push_host(&transport, "host1", "kubernetes");
        let queue = DrainingClient::new("mesos-test", Box::new(transport), "drain-url", "terminate-url", None, DEFAULT_DRAIN_CACHE_SECONDS);
        let driver = FakeDriver { down_calls: Mutex::new(0), up_calls: Mutex::new(0) };
        process_termination_queue(&queue, &FakeRegistry, &driver, "mesos-test").await.unwrap();
        assert_eq!(*driver.down_calls.lock().unwrap(), 0);
    }
}
