use crate::db::StudentDb;
use async_trait::async_trait;
use student_core::{
    GroupKey, NewPrediction, PredictionRecord, ServiceError, Student, StudentRepository,
};

#[async_trait]
impl StudentRepository for StudentDb {
    async fn get_student(&self, student_id: i64) -> Result<Option<Student>, ServiceError> {
        Ok(StudentDb::get_student(self, student_id).await?)
    }

    async fn students_in_class(&self, key: &GroupKey) -> Result<Vec<Student>, ServiceError> {
        Ok(StudentDb::students_in_class(self, key).await?)
    }

    async fn insert_prediction(
        &self,
        prediction: &NewPrediction,
    ) -> Result<PredictionRecord, ServiceError> {
        Ok(StudentDb::insert_prediction(self, prediction).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use student_core::Category;

    #[tokio::test]
    async fn test_errors_surface_as_persistence() {
        let db = StudentDb::new("sqlite::memory:").await.unwrap();
        let repo: &dyn StudentRepository = &db;

        assert!(repo.get_student(1).await.unwrap().is_none());

        let err = repo
            .insert_prediction(&NewPrediction {
                student_id: 1,
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                predicted_score: 0.5,
                category: Category::Pass,
                model_type: "LogisticRegression".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), "persistence");
    }
}
