//! The migration engine (§4.F): uptime and event-driven node recycling,
//! built on top of the pool-health monitor, the sort-and-chunk selection
//! algorithm, and a per-pool lock registry.

mod error;
mod event;
mod health;
mod pool_lock;
mod selection;
mod uptime;

pub use error::EngineError;
pub use event::{run_event_worker, INITIAL_POOL_HEALTH_TIMEOUT_SECONDS};
pub use health::monitor_pool_health;
pub use pool_lock::{PoolLockGuard, PoolLockRegistry};
pub use selection::drain_node_selection;
pub use uptime::{run_uptime_worker, UPTIME_CHECK_INTERVAL_SECONDS};
