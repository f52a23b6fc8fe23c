use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("transport error talking to {queue_url}: {message}")]
    Transport { queue_url: String, message: String },

    #[error("malformed message body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("cloud describe failed for instance {instance_id}: {message}")]
    CloudDescribe { instance_id: String, message: String },

    #[error("hostname resolution failed for {ip}: {message}")]
    HostnameResolution { ip: String, message: String },
}
