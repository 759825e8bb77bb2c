use crate::db::StudentDb;
use crate::error::StoreResult;
use crate::models::{collect_rows, FeatureSetRow, StudentRow};
use sqlx::SqliteConnection;
use student_core::{
    DerivedMetrics, GroupKey, ServiceError, Student, StudentFeatureSet, StudentInput,
};

const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, dob, program, section, \
     test_1_score, test_2_score, test_3_score, avg_test_score, score_improvement_rate, \
     test_scores_std_dev, learn_guide_completed";

/// Append one snapshot of the current scores and metrics
async fn append_feature_set(
    conn: &mut SqliteConnection,
    student_id: i64,
    input: &StudentInput,
    metrics: &DerivedMetrics,
) -> StoreResult<i64> {
    let (feature_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO student_feature_sets (
            student_id, test_1_score, test_2_score, test_3_score,
            avg_test_score, score_improvement_rate, test_scores_std_dev, learn_guide_completed
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING feature_id
        "#,
    )
    .bind(student_id)
    .bind(input.test_1_score)
    .bind(input.test_2_score)
    .bind(input.test_3_score)
    .bind(metrics.average)
    .bind(metrics.improvement_rate)
    .bind(metrics.std_dev)
    .bind(input.learn_guide_completed)
    .fetch_one(conn)
    .await?;

    Ok(feature_id)
}

impl StudentDb {
    /// Insert a student with derived metrics and its first feature snapshot
    pub async fn create_student(&self, input: &StudentInput) -> StoreResult<Student> {
        let dob = input.parse_dob()?;
        let metrics = input.raw_scores().metrics();

        let mut tx = self.pool().begin().await?;

        let (student_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO students (
                first_name, last_name, dob, program, section,
                test_1_score, test_2_score, test_3_score,
                avg_test_score, score_improvement_rate, test_scores_std_dev, learn_guide_completed
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING student_id
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(dob.format("%Y-%m-%d").to_string())
        .bind(&input.program)
        .bind(&input.section)
        .bind(input.test_1_score)
        .bind(input.test_2_score)
        .bind(input.test_3_score)
        .bind(metrics.average)
        .bind(metrics.improvement_rate)
        .bind(metrics.std_dev)
        .bind(input.learn_guide_completed)
        .fetch_one(&mut *tx)
        .await?;

        append_feature_set(&mut *tx, student_id, input, &metrics).await?;
        tx.commit().await?;

        tracing::info!(
            student_id,
            class = %GroupKey::new(&input.program, &input.section),
            "Student created"
        );

        Ok(Student {
            student_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            dob,
            program: input.program.clone(),
            section: input.section.clone(),
            test_1_score: input.test_1_score,
            test_2_score: input.test_2_score,
            test_3_score: input.test_3_score,
            avg_test_score: metrics.average,
            score_improvement_rate: metrics.improvement_rate,
            test_scores_std_dev: metrics.std_dev,
            learn_guide_completed: input.learn_guide_completed,
        })
    }

    /// Replace a student's fields, recompute metrics and append a snapshot
    pub async fn update_student(
        &self,
        student_id: i64,
        input: &StudentInput,
    ) -> StoreResult<Student> {
        let dob = input.parse_dob()?;
        let metrics = input.raw_scores().metrics();

        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE students
            SET first_name = ?, last_name = ?, dob = ?, program = ?, section = ?,
                test_1_score = ?, test_2_score = ?, test_3_score = ?,
                avg_test_score = ?, score_improvement_rate = ?, test_scores_std_dev = ?,
                learn_guide_completed = ?
            WHERE student_id = ?
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(dob.format("%Y-%m-%d").to_string())
        .bind(&input.program)
        .bind(&input.section)
        .bind(input.test_1_score)
        .bind(input.test_2_score)
        .bind(input.test_3_score)
        .bind(metrics.average)
        .bind(metrics.improvement_rate)
        .bind(metrics.std_dev)
        .bind(input.learn_guide_completed)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Student with id {student_id} not found."
            ))
            .into());
        }

        append_feature_set(&mut *tx, student_id, input, &metrics).await?;
        tx.commit().await?;

        tracing::info!(student_id, "Student updated");

        Ok(Student {
            student_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            dob,
            program: input.program.clone(),
            section: input.section.clone(),
            test_1_score: input.test_1_score,
            test_2_score: input.test_2_score,
            test_3_score: input.test_3_score,
            avg_test_score: metrics.average,
            score_improvement_rate: metrics.improvement_rate,
            test_scores_std_dev: metrics.std_dev,
            learn_guide_completed: input.learn_guide_completed,
        })
    }

    /// Delete a student; snapshots and predictions go with it
    pub async fn delete_student(&self, student_id: i64) -> StoreResult<i64> {
        let result = sqlx::query("DELETE FROM students WHERE student_id = ?")
            .bind(student_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Student with id {student_id} not found."
            ))
            .into());
        }

        tracing::info!(student_id, "Student deleted");
        Ok(student_id)
    }

    pub async fn get_student(&self, student_id: i64) -> StoreResult<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?"
        ))
        .bind(student_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Student::try_from).transpose()
    }

    pub async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY last_name, first_name, student_id"
        ))
        .fetch_all(self.pool())
        .await?;

        collect_rows(rows)
    }

    /// All students of one program/section, ordered by id
    pub async fn students_in_class(&self, key: &GroupKey) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE program = ? AND section = ? ORDER BY student_id"
        ))
        .bind(&key.program)
        .bind(&key.section)
        .fetch_all(self.pool())
        .await?;

        collect_rows(rows)
    }

    /// Feature snapshots for a student, newest first
    pub async fn feature_history(&self, student_id: i64) -> StoreResult<Vec<StudentFeatureSet>> {
        let rows = sqlx::query_as::<_, FeatureSetRow>(
            r#"
            SELECT feature_id, student_id, test_1_score, test_2_score, test_3_score,
                   avg_test_score, score_improvement_rate, test_scores_std_dev, learn_guide_completed
            FROM student_feature_sets
            WHERE student_id = ?
            ORDER BY feature_id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(StudentFeatureSet::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn input(first: &str, last: &str, section: &str, scores: [Option<f64>; 3]) -> StudentInput {
        StudentInput {
            first_name: first.to_string(),
            last_name: last.to_string(),
            dob: "2004-05-17".to_string(),
            program: "CS".to_string(),
            section: section.to_string(),
            test_1_score: scores[0],
            test_2_score: scores[1],
            test_3_score: scores[2],
            learn_guide_completed: true,
        }
    }

    async fn setup() -> StudentDb {
        StudentDb::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_computes_metrics() {
        let db = setup().await;
        let created = db
            .create_student(&input("Ada", "Lovelace", "A", [Some(80.0), Some(90.0), Some(100.0)]))
            .await
            .unwrap();

        assert_eq!(created.avg_test_score, Some(90.0));
        assert_eq!(created.score_improvement_rate, Some(25.0));
        assert_eq!(created.test_scores_std_dev, Some(8.16));

        let fetched = db.get_student(created.student_id).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let history = db.feature_history(created.student_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].avg_test_score, Some(90.0));
    }

    #[tokio::test]
    async fn test_infinite_rate_round_trips() {
        let db = setup().await;
        let created = db
            .create_student(&input("Zero", "Start", "A", [Some(0.0), None, Some(50.0)]))
            .await
            .unwrap();
        assert_eq!(created.score_improvement_rate, Some(f64::INFINITY));

        let fetched = db.get_student(created.student_id).await.unwrap().unwrap();
        assert_eq!(fetched.score_improvement_rate, Some(f64::INFINITY));
    }

    #[tokio::test]
    async fn test_invalid_dob_is_validation_error() {
        let db = setup().await;
        let mut bad = input("Bad", "Date", "A", [None, None, None]);
        bad.dob = "17/05/2004".to_string();

        let err = db.create_student(&bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Service(ServiceError::Validation(_))));
        assert!(db.list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_appends_snapshot() {
        let db = setup().await;
        let created = db
            .create_student(&input("Ada", "Lovelace", "A", [Some(60.0), None, None]))
            .await
            .unwrap();

        let updated = db
            .update_student(
                created.student_id,
                &input("Ada", "Lovelace", "B", [Some(60.0), Some(70.0), Some(90.0)]),
            )
            .await
            .unwrap();
        assert_eq!(updated.section, "B");
        assert_eq!(updated.score_improvement_rate, Some(50.0));

        let history = db.feature_history(created.student_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].test_3_score, Some(90.0));
        assert_eq!(history[1].test_3_score, None);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_student() {
        let db = setup().await;
        let err = db
            .update_student(42, &input("No", "One", "A", [None, None, None]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Service(ServiceError::NotFound(_))));

        let err = db.delete_student(42).await.unwrap_err();
        assert!(matches!(err, StoreError::Service(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_cascades_snapshots() {
        let db = setup().await;
        let created = db
            .create_student(&input("Ada", "Lovelace", "A", [Some(60.0), None, None]))
            .await
            .unwrap();

        assert_eq!(db.delete_student(created.student_id).await.unwrap(), created.student_id);
        assert!(db.get_student(created.student_id).await.unwrap().is_none());
        assert!(db.feature_history(created.student_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_and_class_filter() {
        let db = setup().await;
        let turing = db
            .create_student(&input("Alan", "Turing", "A", [None, None, None]))
            .await
            .unwrap();
        db.create_student(&input("Grace", "Hopper", "B", [None, None, None]))
            .await
            .unwrap();
        let lovelace = db
            .create_student(&input("Ada", "Lovelace", "A", [None, None, None]))
            .await
            .unwrap();

        let names: Vec<String> = db
            .list_students()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.last_name)
            .collect();
        assert_eq!(names, vec!["Hopper", "Lovelace", "Turing"]);

        let class_a = db.students_in_class(&GroupKey::new("CS", "A")).await.unwrap();
        let ids: Vec<i64> = class_a.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, vec![turing.student_id, lovelace.student_id]);

        assert!(db
            .students_in_class(&GroupKey::new("CS", "Z"))
            .await
            .unwrap()
            .is_empty());
    }
}
