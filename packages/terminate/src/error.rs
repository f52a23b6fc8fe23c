use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminateError {
    #[error(transparent)]
    Queue(#[from] fleet_migrate_queue::QueueError),
}
