//! Row types as stored in SQLite. Dates are ISO `YYYY-MM-DD` text.

use crate::error::StoreError;
use chrono::NaiveDate;
use sqlx::FromRow;
use student_core::{Category, PredictionRecord, Student, StudentFeatureSet};

fn parse_date(column: &str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StoreError::CorruptRow(format!("{column} '{value}': {e}")))
}

#[derive(Debug, FromRow)]
pub(crate) struct StudentRow {
    student_id: i64,
    first_name: String,
    last_name: String,
    dob: String,
    program: String,
    section: String,
    test_1_score: Option<f64>,
    test_2_score: Option<f64>,
    test_3_score: Option<f64>,
    avg_test_score: Option<f64>,
    score_improvement_rate: Option<f64>,
    test_scores_std_dev: Option<f64>,
    learn_guide_completed: bool,
}

impl TryFrom<StudentRow> for Student {
    type Error = StoreError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Student {
            student_id: row.student_id,
            dob: parse_date("dob", &row.dob)?,
            first_name: row.first_name,
            last_name: row.last_name,
            program: row.program,
            section: row.section,
            test_1_score: row.test_1_score,
            test_2_score: row.test_2_score,
            test_3_score: row.test_3_score,
            avg_test_score: row.avg_test_score,
            score_improvement_rate: row.score_improvement_rate,
            test_scores_std_dev: row.test_scores_std_dev,
            learn_guide_completed: row.learn_guide_completed,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct FeatureSetRow {
    feature_id: i64,
    student_id: i64,
    test_1_score: Option<f64>,
    test_2_score: Option<f64>,
    test_3_score: Option<f64>,
    avg_test_score: Option<f64>,
    score_improvement_rate: Option<f64>,
    test_scores_std_dev: Option<f64>,
    learn_guide_completed: bool,
}

impl From<FeatureSetRow> for StudentFeatureSet {
    fn from(row: FeatureSetRow) -> Self {
        StudentFeatureSet {
            feature_id: row.feature_id,
            student_id: row.student_id,
            test_1_score: row.test_1_score,
            test_2_score: row.test_2_score,
            test_3_score: row.test_3_score,
            avg_test_score: row.avg_test_score,
            score_improvement_rate: row.score_improvement_rate,
            test_scores_std_dev: row.test_scores_std_dev,
            learn_guide_completed: row.learn_guide_completed,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PredictionRow {
    prediction_id: i64,
    student_id: i64,
    date: String,
    predicted_score: f64,
    category: String,
    model_type: String,
}

impl TryFrom<PredictionRow> for PredictionRecord {
    type Error = StoreError;

    fn try_from(row: PredictionRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category)
            .ok_or_else(|| StoreError::CorruptRow(format!("category '{}'", row.category)))?;
        Ok(PredictionRecord {
            prediction_id: row.prediction_id,
            student_id: row.student_id,
            date: parse_date("date", &row.date)?,
            predicted_score: row.predicted_score,
            category,
            model_type: row.model_type,
        })
    }
}

pub(crate) fn collect_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
