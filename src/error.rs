use crate::domain::metrics::MetricError;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("record not found")]
    NotFound,
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid check-in: {0}")]
    Validation(#[from] MetricError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no plan for that day")]
    PlanNotFound,
    #[error("action {0} is not part of the plan")]
    ActionNotFound(Uuid),
    #[error("no other action available in that category")]
    NoSwapCandidate,
    #[error("action {0} was already completed or skipped")]
    ActionNotPending(Uuid),
    #[error("plan belongs to another user")]
    ForeignPlan,
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
