use async_trait::async_trait;
use fleet_migrate_types::{Host, Scheduler, Sender, TerminationReason};
use serde::Deserialize;
use serde_json::json;

use crate::error::QueueError;
use crate::resolve::{host_from_instance_id, CloudLookup};
use crate::ttl_cache::TtlCache;

/// Message bus send/receive/delete surface the `DrainingClient` is built
/// against; the concrete queue backend (SQS or otherwise) is an external
/// collaborator.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn send_message(&self, request: SendMessageRequest) -> Result<String, QueueError>;
    async fn receive_message(&self, queue_url: &str) -> Result<Option<RawMessage>, QueueError>;
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;
}

pub struct SendMessageRequest {
    pub queue_url: String,
    pub body: String,
    pub sender: Sender,
    pub delay_seconds: Option<u64>,
}

pub struct RawMessage {
    pub receipt_handle: String,
    pub body: String,
    pub sender: Option<Sender>,
}

/// The minimal instance facts needed to originate a first-attempt drain
/// submission (as opposed to resubmitting an existing `Host`).
pub struct DrainCandidate {
    pub instance_id: String,
    pub ip: String,
    pub hostname: String,
    pub group_id: String,
}

#[derive(Deserialize)]
struct HostBody {
    instance_id: String,
    ip: String,
    hostname: String,
    group_id: String,
    #[serde(default)]
    agent_id: String,
    pool: String,
    #[serde(default)]
    scheduler: Scheduler,
    draining_start_time: String,
    #[serde(default)]
    termination_reason: TerminationReason,
    #[serde(default = "default_attempt")]
    attempt: u32,
}

fn default_attempt() -> u32 {
    1
}

#[derive(Deserialize)]
struct WarningBody {
    detail: WarningDetail,
}

#[derive(Deserialize)]
struct WarningDetail {
    #[serde(rename = "instance-id")]
    instance_id: String,
}

pub const DEFAULT_TERMINATE_DELAY_SECONDS: u64 = 90;
pub const DEFAULT_DRAIN_CACHE_SECONDS: i64 = 60;

/// Per-cluster singleton owning the drain/terminate/warning queues and the
/// in-flight-drain dedupe cache.
pub struct DrainingClient {
    cluster: String,
    transport: Box<dyn QueueTransport>,
    drain_queue_url: String,
    termination_queue_url: String,
    warning_queue_url: Option<String>,
    ttl_cache: TtlCache,
}

impl DrainingClient {
    pub fn new(
        cluster: impl Into<String>,
        transport: Box<dyn QueueTransport>,
        drain_queue_url: impl Into<String>,
        termination_queue_url: impl Into<String>,
        warning_queue_url: Option<String>,
        ttl_seconds: i64,
    ) -> Self {
        DrainingClient {
            cluster: cluster.into(),
            transport,
            drain_queue_url: drain_queue_url.into(),
            termination_queue_url: termination_queue_url.into(),
            warning_queue_url,
            ttl_cache: TtlCache::new(ttl_seconds),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn ttl_cache(&self) -> &TtlCache {
        &self.ttl_cache
    }

    pub fn clean_processing_hosts_cache(&self, now_unix: i64) {
        self.ttl_cache.clean_processing_hosts_cache(now_unix);
    }

    pub async fn submit_instance_for_draining(
        &self,
        candidate: &DrainCandidate,
        sender: Sender,
        scheduler: Scheduler,
        pool: &str,
        agent_id: &str,
        draining_start_time: &str,
        termination_reason: TerminationReason,
    ) -> Result<String, QueueError> {
        let body = json!({
            "agent_id": agent_id,
            "attempt": 1,
            "draining_start_time": draining_start_time,
            "group_id": candidate.group_id,
            "hostname": candidate.hostname,
            "instance_id": candidate.instance_id,
            "ip": candidate.ip,
            "pool": pool,
            "termination_reason": termination_reason,
            "scheduler": scheduler,
        })
        .to_string();
        self.transport
            .send_message(SendMessageRequest {
                queue_url: self.drain_queue_url.clone(),
                body,
                sender,
                delay_seconds: None,
            })
            .await
    }

    pub async fn submit_host_for_draining(&self, host: &Host, delay: u64, attempt: u32) -> Result<String, QueueError> {
        let body = json!({
            "instance_id": host.instance_id,
            "ip": host.ip,
            "hostname": host.hostname,
            "group_id": host.group_id,
            "scheduler": host.scheduler,
            "agent_id": host.agent_id,
            "attempt": attempt,
            "pool": host.pool,
            "draining_start_time": host.draining_start_time,
            "termination_reason": host.termination_reason,
        })
        .to_string();
        self.transport
            .send_message(SendMessageRequest {
                queue_url: self.drain_queue_url.clone(),
                body,
                sender: host.sender.clone(),
                delay_seconds: Some(delay),
            })
            .await
    }

    pub async fn submit_host_for_termination(&self, host: &Host, delay: u64) -> Result<String, QueueError> {
        let body = json!({
            "agent_id": host.agent_id,
            "draining_start_time": host.draining_start_time,
            "group_id": host.group_id,
            "hostname": host.hostname,
            "instance_id": host.instance_id,
            "ip": host.ip,
            "pool": host.pool,
            "scheduler": host.scheduler,
            "termination_reason": host.termination_reason,
        })
        .to_string();
        self.transport
            .send_message(SendMessageRequest {
                queue_url: self.termination_queue_url.clone(),
                body,
                sender: host.sender.clone(),
                delay_seconds: Some(delay),
            })
            .await
    }

    pub async fn get_host_to_drain(&self) -> Result<Option<Host>, QueueError> {
        self.receive_host(&self.drain_queue_url).await
    }

    pub async fn get_host_to_terminate(&self) -> Result<Option<Host>, QueueError> {
        self.receive_host(&self.termination_queue_url).await
    }

    async fn receive_host(&self, queue_url: &str) -> Result<Option<Host>, QueueError> {
        let Some(raw) = self.transport.receive_message(queue_url).await? else {
            return Ok(None);
        };
        let body: HostBody = serde_json::from_str(&raw.body)?;
        let sender = raw.sender.unwrap_or(Sender::Clusterman);
        Ok(Some(Host {
            instance_id: body.instance_id,
            ip: body.ip,
            hostname: body.hostname,
            group_id: body.group_id,
            agent_id: body.agent_id,
            pool: body.pool,
            scheduler: body.scheduler,
            sender,
            receipt_handle: raw.receipt_handle,
            draining_start_time: body.draining_start_time,
            termination_reason: body.termination_reason,
            attempt: body.attempt,
        }))
    }

    /// Reads one warning event and resolves it to a `Host` via `resolve`.
    /// Unresolvable warnings are deleted here (there's nothing further to
    /// act on); resolved ones are left for the caller to delete once
    /// drain submission succeeds.
    pub async fn get_warned_host(&self, cloud: &dyn CloudLookup) -> Result<Option<Host>, QueueError> {
        let Some(warning_queue_url) = &self.warning_queue_url else {
            return Ok(None);
        };
        let Some(raw) = self.transport.receive_message(warning_queue_url).await? else {
            return Ok(None);
        };
        let parsed: WarningBody = serde_json::from_str(&raw.body)?;
        let resolved = host_from_instance_id(cloud, &raw.receipt_handle, &parsed.detail.instance_id).await;
        if resolved.is_none() {
            self.transport.delete_message(warning_queue_url, &raw.receipt_handle).await?;
        }
        Ok(resolved)
    }

    pub async fn delete_drain_messages(&self, hosts: &[Host]) -> Result<(), QueueError> {
        for host in hosts {
            self.transport.delete_message(&self.drain_queue_url, &host.receipt_handle).await?;
        }
        Ok(())
    }

    pub async fn delete_terminate_messages(&self, hosts: &[Host]) -> Result<(), QueueError> {
        for host in hosts {
            self.transport.delete_message(&self.termination_queue_url, &host.receipt_handle).await?;
        }
        Ok(())
    }

    pub async fn delete_warning_messages(&self, hosts: &[Host]) -> Result<(), QueueError> {
        let Some(warning_queue_url) = &self.warning_queue_url else {
            return Ok(());
        };
        for host in hosts {
            self.transport.delete_message(warning_queue_url, &host.receipt_handle).await?;
        }
        Ok(())
    }
}
