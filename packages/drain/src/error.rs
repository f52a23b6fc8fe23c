use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error(transparent)]
    Queue(#[from] fleet_migrate_queue::QueueError),
}
