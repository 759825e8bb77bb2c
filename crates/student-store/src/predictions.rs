use crate::db::StudentDb;
use crate::error::StoreResult;
use crate::models::{collect_rows, PredictionRow};
use student_core::{GroupKey, NewPrediction, PredictionRecord};

impl StudentDb {
    /// Append one prediction to history
    pub async fn insert_prediction(
        &self,
        prediction: &NewPrediction,
    ) -> StoreResult<PredictionRecord> {
        let (prediction_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO predictions (student_id, date, predicted_score, category, model_type)
            VALUES (?, ?, ?, ?, ?)
            RETURNING prediction_id
            "#,
        )
        .bind(prediction.student_id)
        .bind(prediction.date.format("%Y-%m-%d").to_string())
        .bind(prediction.predicted_score)
        .bind(prediction.category.as_str())
        .bind(&prediction.model_type)
        .fetch_one(self.pool())
        .await?;

        tracing::debug!(
            prediction_id,
            student_id = prediction.student_id,
            category = %prediction.category,
            "Prediction stored"
        );

        Ok(PredictionRecord {
            prediction_id,
            student_id: prediction.student_id,
            date: prediction.date,
            predicted_score: prediction.predicted_score,
            category: prediction.category,
            model_type: prediction.model_type.clone(),
        })
    }

    /// Every prediction for a student, newest first
    pub async fn predictions_for_student(
        &self,
        student_id: i64,
    ) -> StoreResult<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT prediction_id, student_id, date, predicted_score, category, model_type
            FROM predictions
            WHERE student_id = ?
            ORDER BY date DESC, prediction_id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await?;

        collect_rows(rows)
    }

    pub async fn latest_prediction_for_student(
        &self,
        student_id: i64,
    ) -> StoreResult<Option<PredictionRecord>> {
        let row = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT prediction_id, student_id, date, predicted_score, category, model_type
            FROM predictions
            WHERE student_id = ?
            ORDER BY date DESC, prediction_id DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(PredictionRecord::try_from).transpose()
    }

    /// Full prediction history of a class, grouped by student
    pub async fn predictions_for_class(
        &self,
        key: &GroupKey,
    ) -> StoreResult<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT p.prediction_id, p.student_id, p.date, p.predicted_score, p.category, p.model_type
            FROM predictions p
            JOIN students s ON s.student_id = p.student_id
            WHERE s.program = ? AND s.section = ?
            ORDER BY p.student_id ASC, p.date DESC, p.prediction_id DESC
            "#,
        )
        .bind(&key.program)
        .bind(&key.section)
        .fetch_all(self.pool())
        .await?;

        collect_rows(rows)
    }

    /// The most recent prediction of each student in a class
    pub async fn latest_predictions_for_class(
        &self,
        key: &GroupKey,
    ) -> StoreResult<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT p.prediction_id, p.student_id, p.date, p.predicted_score, p.category, p.model_type
            FROM predictions p
            JOIN students s ON s.student_id = p.student_id
            WHERE s.program = ? AND s.section = ?
              AND p.prediction_id = (
                  SELECT latest.prediction_id
                  FROM predictions latest
                  WHERE latest.student_id = p.student_id
                  ORDER BY latest.date DESC, latest.prediction_id DESC
                  LIMIT 1
              )
            ORDER BY p.student_id ASC
            "#,
        )
        .bind(&key.program)
        .bind(&key.section)
        .fetch_all(self.pool())
        .await?;

        collect_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::NaiveDate;
    use student_core::{Category, StudentInput};

    async fn setup_with_students(sections: &[&str]) -> (StudentDb, Vec<i64>) {
        let db = StudentDb::new("sqlite::memory:").await.unwrap();
        let mut ids = Vec::new();
        for (i, section) in sections.iter().enumerate() {
            let student = db
                .create_student(&StudentInput {
                    first_name: format!("Student{i}"),
                    last_name: "Test".to_string(),
                    dob: "2003-01-01".to_string(),
                    program: "MATH".to_string(),
                    section: section.to_string(),
                    test_1_score: Some(70.0),
                    test_2_score: None,
                    test_3_score: Some(80.0),
                    learn_guide_completed: false,
                })
                .await
                .unwrap();
            ids.push(student.student_id);
        }
        (db, ids)
    }

    fn prediction(student_id: i64, date: &str, score: f64) -> NewPrediction {
        NewPrediction {
            student_id,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            predicted_score: score,
            category: Category::from_numeric(u8::from(score >= 0.5)),
            model_type: "LogisticRegression".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_history_order() {
        let (db, ids) = setup_with_students(&["A"]).await;
        let id = ids[0];

        let older = db.insert_prediction(&prediction(id, "2026-01-10", 0.4)).await.unwrap();
        let newer = db.insert_prediction(&prediction(id, "2026-02-01", 0.7)).await.unwrap();
        let same_day = db.insert_prediction(&prediction(id, "2026-02-01", 0.9)).await.unwrap();

        assert_eq!(older.category, Category::Fail);
        assert_eq!(newer.category, Category::Pass);

        let history: Vec<i64> = db
            .predictions_for_student(id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.prediction_id)
            .collect();
        assert_eq!(
            history,
            vec![same_day.prediction_id, newer.prediction_id, older.prediction_id]
        );

        let latest = db.latest_prediction_for_student(id).await.unwrap().unwrap();
        assert_eq!(latest, same_day);
    }

    #[tokio::test]
    async fn test_no_predictions_yet() {
        let (db, ids) = setup_with_students(&["A"]).await;
        assert!(db.predictions_for_student(ids[0]).await.unwrap().is_empty());
        assert!(db.latest_prediction_for_student(ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_student() {
        let (db, _) = setup_with_students(&[]).await;
        let err = db
            .insert_prediction(&prediction(999, "2026-01-01", 0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_class_history_and_latest() {
        let (db, ids) = setup_with_students(&["A", "A", "B"]).await;

        db.insert_prediction(&prediction(ids[0], "2026-01-01", 0.2)).await.unwrap();
        let first_latest = db.insert_prediction(&prediction(ids[0], "2026-03-01", 0.8)).await.unwrap();
        let second_latest = db.insert_prediction(&prediction(ids[1], "2026-02-01", 0.6)).await.unwrap();
        db.insert_prediction(&prediction(ids[2], "2026-04-01", 0.9)).await.unwrap();

        let key = GroupKey::new("MATH", "A");

        let history = db.predictions_for_class(&key).await.unwrap();
        let order: Vec<(i64, String)> = history
            .iter()
            .map(|p| (p.student_id, p.date.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (ids[0], "2026-03-01".to_string()),
                (ids[0], "2026-01-01".to_string()),
                (ids[1], "2026-02-01".to_string()),
            ]
        );

        let latest = db.latest_predictions_for_class(&key).await.unwrap();
        assert_eq!(latest, vec![first_latest, second_latest]);
    }

    #[tokio::test]
    async fn test_delete_student_removes_predictions() {
        let (db, ids) = setup_with_students(&["A"]).await;
        db.insert_prediction(&prediction(ids[0], "2026-01-01", 0.6)).await.unwrap();

        db.delete_student(ids[0]).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
