//! The draining queue: a durable message-bus abstraction over two logical
//! queues (drain, terminate) plus an optional warning queue, and the
//! in-flight-drain dedupe cache that sits in front of them.

mod client;
mod error;
mod resolve;
mod ttl_cache;

pub use client::{
    DrainCandidate, DrainingClient, QueueTransport, RawMessage, SendMessageRequest, DEFAULT_DRAIN_CACHE_SECONDS,
    DEFAULT_TERMINATE_DELAY_SECONDS,
};
pub use error::QueueError;
pub use resolve::{host_from_instance_id, CloudLookup, InstanceDescription};
pub use ttl_cache::TtlCache;
