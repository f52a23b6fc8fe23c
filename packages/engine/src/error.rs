use thiserror::Error;

/// Raised by the event worker; the uptime worker never raises, it only
/// logs and skips an iteration (§4.F.3).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("timed out acquiring pool lock for {cluster}/{pool} after {timeout_secs}s")]
    LockTimeout { cluster: String, pool: String, timeout_secs: u64 },

    #[error("pool {cluster}/{pool} did not reach initial health within {timeout_secs}s")]
    InitialHealthTimeout { cluster: String, pool: String, timeout_secs: u64 },

    #[error("drain node selection for {cluster}/{pool} exceeded its budget of {budget_secs}s")]
    BudgetExceeded { cluster: String, pool: String, budget_secs: u64 },

    #[error("drain node selection for {cluster}/{pool} stopped after a chunk failed its health gate")]
    SelectionFailed { cluster: String, pool: String },
}
