//! Pass/fail model artifacts and the feature pipeline that feeds them.
//!
//! The [`ModelStore`] is created once at startup and shared by handle; the
//! [`pipeline::predict`] entry point never fails and reports degraded
//! inference through [`PipelineOutput`] instead.

pub mod artifacts;
pub mod error;
pub mod pipeline;
pub mod store;

pub use artifacts::{
    Classifier, LogisticRegression, MinMaxScaler, ModelArtifacts, Scaler, StandardScaler,
    FEATURE_NAMES_FILENAME, MODEL_FILENAME, SCALER_FILENAME,
};
pub use error::{ArtifactError, ModelError, ModelResult};
pub use pipeline::{
    predict, predict_with, DegradedReason, FeatureRow, PipelineOutput, RowPrediction,
};
pub use store::{LoadReport, ModelStore};
