//! Feature engineering and inference for the pass/fail classifier.
//!
//! `predict` is fail-safe: it always returns one prediction per input row.
//! When inference cannot run, every row carries a fixed sentinel probability
//! and the output is tagged [`PipelineOutput::Degraded`]. Callers that need a
//! real answer check [`ModelStore::is_ready`] before calling.

use crate::artifacts::ModelArtifacts;
use crate::error::{ModelError, ModelResult};
use crate::store::ModelStore;
use nalgebra::DMatrix;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

pub const TEST_1_SCORE: &str = "test_1_score";
pub const TEST_2_SCORE: &str = "test_2_score";
pub const TEST_3_SCORE: &str = "test_3_score";
pub const LEARN_GUIDE_COMPLETED: &str = "learn_guide_completed";
pub const SCORE_IMPROVEMENT_RATE: &str = "score_improvement_rate";
pub const TEST_SCORES_STD_DEV: &str = "test_scores_std_dev";

/// Probability at or above which a row is classified as Pass
pub const PASS_THRESHOLD: f64 = 0.5;

/// Why inference fell back to sentinel outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DegradedReason {
    /// Artifacts are not loaded
    NotLoaded,
    /// Scaler or classifier rejected the input values or shape
    InvalidValue,
    /// Any other inference failure
    Failure,
}

impl DegradedReason {
    pub fn sentinel_probability(&self) -> f64 {
        match self {
            DegradedReason::NotLoaded => 0.01,
            DegradedReason::InvalidValue => 0.02,
            DegradedReason::Failure => 0.03,
        }
    }
}

impl From<&ModelError> for DegradedReason {
    fn from(e: &ModelError) -> Self {
        match e {
            ModelError::InvalidValue(_) => DegradedReason::InvalidValue,
            ModelError::Failure(_) => DegradedReason::Failure,
        }
    }
}

/// Raw per-student input. Extra named features pass straight through to the
/// matrix when the model declares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    pub test_1_score: Option<f64>,
    pub test_2_score: Option<f64>,
    pub test_3_score: Option<f64>,
    pub learn_guide_completed: Option<bool>,
    pub extra: BTreeMap<String, Option<f64>>,
}

impl FeatureRow {
    pub fn new(
        test_1_score: Option<f64>,
        test_2_score: Option<f64>,
        test_3_score: Option<f64>,
        learn_guide_completed: Option<bool>,
    ) -> Self {
        Self {
            test_1_score,
            test_2_score,
            test_3_score,
            learn_guide_completed,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// All named values for this row, including features derived for the
    /// model. Infinite and NaN values come back as `None`.
    fn frame(&self, declared: &[String]) -> HashMap<String, Option<f64>> {
        let mut frame: HashMap<String, Option<f64>> = self.extra.clone().into_iter().collect();

        frame.insert(TEST_1_SCORE.to_string(), self.test_1_score);
        frame.insert(TEST_2_SCORE.to_string(), self.test_2_score);
        frame.insert(TEST_3_SCORE.to_string(), self.test_3_score);
        let completed = if self.learn_guide_completed.unwrap_or(false) {
            1.0
        } else {
            0.0
        };
        frame.insert(LEARN_GUIDE_COMPLETED.to_string(), Some(completed));

        let wants = |name: &str| declared.iter().any(|d| d == name);

        if wants(SCORE_IMPROVEMENT_RATE) {
            frame.insert(
                SCORE_IMPROVEMENT_RATE.to_string(),
                linear_improvement(self.test_1_score, self.test_3_score),
            );
        }
        if wants(TEST_SCORES_STD_DEV) {
            frame.insert(
                TEST_SCORES_STD_DEV.to_string(),
                sample_std_dev([self.test_1_score, self.test_2_score, self.test_3_score]),
            );
        }

        frame
            .into_iter()
            .map(|(k, v)| (k, v.filter(|x| x.is_finite())))
            .collect()
    }
}

/// Half the change from test 1 to test 3. Not the stored percentage rate:
/// the classifier was trained on this form.
fn linear_improvement(first: Option<f64>, third: Option<f64>) -> Option<f64> {
    match (first, third) {
        (Some(a), Some(c)) => Some((c - a) / 2.0),
        _ => None,
    }
}

/// Sample standard deviation (n - 1) over the present scores.
fn sample_std_dev(scores: [Option<f64>; 3]) -> Option<f64> {
    let present: Vec<f64> = scores
        .into_iter()
        .flatten()
        .filter(|s| !s.is_nan())
        .collect();
    if present.len() < 2 {
        return None;
    }
    Some(present.std_dev())
}

/// One scored row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowPrediction {
    /// Probability of the pass class
    pub probability: f64,
    /// 1 = Pass, 0 = Fail
    pub category: u8,
}

impl RowPrediction {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            category: u8::from(probability >= PASS_THRESHOLD),
        }
    }
}

/// Pipeline result. Always one entry per input row.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Scored(Vec<RowPrediction>),
    Degraded {
        reason: DegradedReason,
        rows: Vec<RowPrediction>,
    },
}

impl PipelineOutput {
    fn degraded(reason: DegradedReason, len: usize) -> Self {
        let sentinel = RowPrediction {
            probability: reason.sentinel_probability(),
            category: 0,
        };
        PipelineOutput::Degraded {
            reason,
            rows: vec![sentinel; len],
        }
    }

    pub fn rows(&self) -> &[RowPrediction] {
        match self {
            PipelineOutput::Scored(rows) => rows,
            PipelineOutput::Degraded { rows, .. } => rows,
        }
    }

    pub fn into_rows(self) -> Vec<RowPrediction> {
        match self {
            PipelineOutput::Scored(rows) => rows,
            PipelineOutput::Degraded { rows, .. } => rows,
        }
    }

    pub fn degraded_reason(&self) -> Option<DegradedReason> {
        match self {
            PipelineOutput::Scored(_) => None,
            PipelineOutput::Degraded { reason, .. } => Some(*reason),
        }
    }
}

/// Build the model input matrix: one row per input, one column per declared
/// feature, in declared order. Missing values are imputed as 0.
pub fn assemble_matrix(feature_names: &[String], rows: &[FeatureRow]) -> DMatrix<f64> {
    let frames: Vec<HashMap<String, Option<f64>>> =
        rows.iter().map(|r| r.frame(feature_names)).collect();

    for name in feature_names {
        if !frames.iter().any(|f| f.contains_key(name)) {
            tracing::warn!(
                feature = %name,
                "Expected feature not in input or engineered; adding as zeros"
            );
        }
    }

    DMatrix::from_fn(rows.len(), feature_names.len(), |i, j| {
        frames[i]
            .get(&feature_names[j])
            .copied()
            .flatten()
            .unwrap_or(0.0)
    })
}

fn score(artifacts: &ModelArtifacts, rows: &[FeatureRow]) -> ModelResult<Vec<RowPrediction>> {
    let (classifier, scaler) = match (&artifacts.classifier, &artifacts.scaler) {
        (Some(c), Some(s)) => (c, s),
        _ => return Err(ModelError::Failure("artifact set is incomplete".to_string())),
    };

    let matrix = assemble_matrix(&artifacts.feature_names, rows);
    let scaled = scaler.transform(&matrix)?;
    let proba = classifier.predict_proba(&scaled)?;

    if proba.nrows() != rows.len() {
        return Err(ModelError::InvalidValue(format!(
            "classifier returned {} rows for {} inputs",
            proba.nrows(),
            rows.len()
        )));
    }
    if proba.ncols() < 2 {
        return Err(ModelError::InvalidValue(format!(
            "classifier returned {} class columns, expected at least 2",
            proba.ncols()
        )));
    }

    proba
        .column(1)
        .iter()
        .map(|&p| {
            if p.is_nan() {
                Err(ModelError::InvalidValue("classifier returned NaN".to_string()))
            } else {
                Ok(RowPrediction::from_probability(p))
            }
        })
        .collect()
}

/// Score a batch of rows against the artifacts currently in `store`.
///
/// Never fails. Not loaded yields probability 0.01 for every row; a value
/// error during scoring yields 0.02, any other error 0.03, always with
/// category 0.
pub fn predict(store: &ModelStore, rows: &[FeatureRow]) -> PipelineOutput {
    predict_with(&store.snapshot(), rows)
}

/// Same as [`predict`], against an artifact set the caller already holds.
pub fn predict_with(artifacts: &ModelArtifacts, rows: &[FeatureRow]) -> PipelineOutput {
    if !artifacts.is_ready() {
        tracing::warn!(
            rows = rows.len(),
            "Model artifacts not fully loaded; returning sentinel predictions"
        );
        return PipelineOutput::degraded(DegradedReason::NotLoaded, rows.len());
    }
    if rows.is_empty() {
        return PipelineOutput::Scored(Vec::new());
    }

    match score(artifacts, rows) {
        Ok(predictions) => {
            tracing::debug!(rows = predictions.len(), "Batch scored");
            PipelineOutput::Scored(predictions)
        }
        Err(e) => {
            let reason = DegradedReason::from(&e);
            tracing::error!(error = %e, rows = rows.len(), ?reason, "Inference failed");
            PipelineOutput::degraded(reason, rows.len())
        }
    }
}
