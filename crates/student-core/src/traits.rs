use async_trait::async_trait;

use crate::{GroupKey, NewPrediction, PredictionRecord, ServiceError, Student};

/// Persistence operations the prediction orchestrator depends on
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn get_student(&self, student_id: i64) -> Result<Option<Student>, ServiceError>;

    /// Students of one class, in a stable order
    async fn students_in_class(&self, key: &GroupKey) -> Result<Vec<Student>, ServiceError>;

    /// Append a prediction to history. Each call is its own unit of work.
    async fn insert_prediction(
        &self,
        prediction: &NewPrediction,
    ) -> Result<PredictionRecord, ServiceError>;
}
