//! Ties student records, the model store and prediction history together.
//!
//! This is the only layer that returns domain errors: the inference pipeline
//! underneath never fails and the repository reports persistence problems
//! as [`ServiceError::Persistence`].

use chrono::{Local, NaiveDate};
use ml_engine::{predict_with, FeatureRow, ModelStore, RowPrediction};
use serde::Serialize;
use std::sync::Arc;
use student_core::{
    Category, GroupKey, NewPrediction, PredictionRecord, ServiceError, ServiceResult, Student,
    StudentRepository,
};

const UNKNOWN_MODEL: &str = "unknown";

/// Readiness summary for the status command
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub model_ready: bool,
    pub model_type: Option<String>,
    pub feature_names: Vec<String>,
}

fn feature_row(student: &Student) -> FeatureRow {
    FeatureRow::new(
        student.test_1_score,
        student.test_2_score,
        student.test_3_score,
        Some(student.learn_guide_completed),
    )
}

pub struct PredictionService {
    store: Arc<ModelStore>,
    repo: Arc<dyn StudentRepository>,
}

impl PredictionService {
    pub fn new(store: Arc<ModelStore>, repo: Arc<dyn StudentRepository>) -> Self {
        Self { store, repo }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn status(&self) -> ServiceStatus {
        let artifacts = self.store.snapshot();
        ServiceStatus {
            model_ready: artifacts.is_ready(),
            model_type: artifacts.model_type().map(str::to_string),
            feature_names: artifacts.feature_names.clone(),
        }
    }

    /// Score one student and append the result to their history
    pub async fn predict_one(&self, student_id: i64) -> ServiceResult<PredictionRecord> {
        let artifacts = self.store.snapshot();
        if !artifacts.is_ready() {
            return Err(model_unavailable());
        }

        let student = self.repo.get_student(student_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Student with id {student_id} not found."))
        })?;

        let output = predict_with(&artifacts, &[feature_row(&student)]);
        if let Some(reason) = output.degraded_reason() {
            tracing::warn!(student_id, ?reason, "Storing sentinel prediction");
        }

        let row = output.rows().first().copied().ok_or_else(|| {
            ServiceError::ModelUnavailable("Model returned no prediction.".to_string())
        })?;

        let model_type = artifacts.model_type().unwrap_or(UNKNOWN_MODEL);
        let record = self
            .repo
            .insert_prediction(&new_prediction(student_id, today(), row, model_type))
            .await?;

        tracing::info!(
            student_id,
            probability = record.predicted_score,
            category = %record.category,
            "Prediction recorded"
        );
        Ok(record)
    }

    /// Score a whole class in one batch.
    ///
    /// Records come back in the order the repository returned the students.
    /// A failed insert is logged and skipped; the rest of the class is kept.
    pub async fn predict_many(&self, key: &GroupKey) -> ServiceResult<Vec<PredictionRecord>> {
        let artifacts = self.store.snapshot();
        if !artifacts.is_ready() {
            return Err(model_unavailable());
        }

        let students = self.repo.students_in_class(key).await?;
        if students.is_empty() {
            tracing::info!(class = %key, "No students in class");
            return Ok(Vec::new());
        }

        let rows: Vec<FeatureRow> = students.iter().map(feature_row).collect();
        let output = predict_with(&artifacts, &rows);
        if let Some(reason) = output.degraded_reason() {
            tracing::warn!(class = %key, ?reason, "Storing sentinel predictions for class");
        }

        let model_type = artifacts.model_type().unwrap_or(UNKNOWN_MODEL);
        let date = today();
        let mut records = Vec::with_capacity(students.len());

        for (student, row) in students.iter().zip(output.rows()) {
            let prediction = new_prediction(student.student_id, date, *row, model_type);
            match self.repo.insert_prediction(&prediction).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!(
                        student_id = student.student_id,
                        class = %key,
                        error = %e,
                        "Failed to store prediction; skipping student"
                    );
                }
            }
        }

        tracing::info!(
            class = %key,
            stored = records.len(),
            total = students.len(),
            "Class predictions recorded"
        );
        Ok(records)
    }
}

fn model_unavailable() -> ServiceError {
    ServiceError::ModelUnavailable(
        "Prediction model is not loaded. Check the model artifacts directory.".to_string(),
    )
}

/// Prediction dates follow the server's local calendar
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn new_prediction(
    student_id: i64,
    date: NaiveDate,
    row: RowPrediction,
    model_type: &str,
) -> NewPrediction {
    NewPrediction {
        student_id,
        date,
        predicted_score: row.probability,
        category: Category::from_numeric(row.category),
        model_type: model_type.to_string(),
    }
}
