//! Typed config loading for the migration engine's worker setup.
//!
//! Bootstrap/CLI wiring stays out of scope; this crate only owns turning a
//! YAML or JSON document into a [`fleet_migrate_types::WorkerSetup`].

use std::time::Duration;

use fleet_migrate_types::{MigrationPrecedence, PoolPortion, WorkerSetup};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
}

fn default_ignore_pod_health() -> bool {
    false
}

fn default_disable_autoscaling() -> bool {
    false
}

/// Wire shape of [`WorkerSetup`]: identical fields, but durations are plain
/// seconds since YAML/JSON have no native duration type.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSetupConfig {
    pub rate: PoolPortion,
    pub prescaling: Option<PoolPortion>,
    pub precedence: MigrationPrecedence,
    pub bootstrap_wait_seconds: u64,
    pub bootstrap_timeout_seconds: u64,
    #[serde(default = "default_disable_autoscaling")]
    pub disable_autoscaling: bool,
    pub expected_duration_seconds: u64,
    pub health_check_interval_seconds: u64,
    #[serde(default = "default_ignore_pod_health")]
    pub ignore_pod_health: bool,
}

impl From<WorkerSetupConfig> for WorkerSetup {
    fn from(c: WorkerSetupConfig) -> Self {
        WorkerSetup {
            rate: c.rate,
            prescaling: c.prescaling,
            precedence: c.precedence,
            bootstrap_wait: Duration::from_secs(c.bootstrap_wait_seconds),
            bootstrap_timeout: Duration::from_secs(c.bootstrap_timeout_seconds),
            disable_autoscaling: c.disable_autoscaling,
            expected_duration: Duration::from_secs(c.expected_duration_seconds),
            health_check_interval: Duration::from_secs(c.health_check_interval_seconds),
            ignore_pod_health: c.ignore_pod_health,
        }
    }
}

/// Loads a `WorkerSetup` from a YAML or JSON file at `path`; format is
/// inferred from the extension by the `config` crate.
pub fn load_worker_setup(path: &str) -> Result<WorkerSetup, ConfigError> {
    let raw: WorkerSetupConfig =
        config::Config::builder().add_source(config::File::with_name(path)).build()?.try_deserialize()?;
    Ok(raw.into())
}
