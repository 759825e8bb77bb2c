use student_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Validation and not-found conditions detected by the store
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Service(inner) => inner,
            other => ServiceError::Persistence(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
