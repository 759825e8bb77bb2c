//! Classifier and scaler capabilities plus their JSON adapters.
//!
//! The pipeline only sees the [`Classifier`] and [`Scaler`] traits. The on-disk
//! format is decided here: each artifact is a small JSON document exported by
//! the training side.

use crate::error::{ArtifactError, ModelError, ModelResult};
use nalgebra::DMatrix;
use serde::Deserialize;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

pub const MODEL_FILENAME: &str = "course_pass_predictor_model.json";
pub const SCALER_FILENAME: &str = "course_pass_scaler.json";
pub const FEATURE_NAMES_FILENAME: &str = "course_pass_feature_names.json";

/// Anything that can turn a feature matrix into per-class probabilities.
pub trait Classifier: Send + Sync + Debug {
    /// Declared type name, recorded with every prediction
    fn type_name(&self) -> &str;

    /// Returns an `n_rows x n_classes` matrix; column 1 is the pass class.
    fn predict_proba(&self, features: &DMatrix<f64>) -> ModelResult<DMatrix<f64>>;
}

/// Anything that can rescale a feature matrix column-wise.
pub trait Scaler: Send + Sync + Debug {
    fn transform(&self, features: &DMatrix<f64>) -> ModelResult<DMatrix<f64>>;
}

fn check_finite(features: &DMatrix<f64>) -> ModelResult<()> {
    if features.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidValue(
            "input contains NaN or infinity".to_string(),
        ));
    }
    Ok(())
}

fn check_columns(features: &DMatrix<f64>, expected: usize, who: &str) -> ModelResult<()> {
    if features.ncols() != expected {
        return Err(ModelError::InvalidValue(format!(
            "{} expects {} features, got {}",
            who,
            expected,
            features.ncols()
        )));
    }
    Ok(())
}

/// Binary logistic regression
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Classifier for LogisticRegression {
    fn type_name(&self) -> &str {
        "LogisticRegression"
    }

    fn predict_proba(&self, features: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        check_columns(features, self.coefficients.len(), "LogisticRegression")?;
        check_finite(features)?;

        let mut out = DMatrix::zeros(features.nrows(), 2);
        for (i, row) in features.row_iter().enumerate() {
            let z: f64 = row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>()
                + self.intercept;
            let p = 1.0 / (1.0 + (-z).exp());
            out[(i, 0)] = 1.0 - p;
            out[(i, 1)] = p;
        }
        Ok(out)
    }
}

/// Standardization: `(x - mean) / scale`
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        check_columns(features, self.mean.len(), "StandardScaler")?;
        if self.scale.len() != self.mean.len() {
            return Err(ModelError::Failure(format!(
                "StandardScaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        check_finite(features)?;

        let mut out = features.clone();
        for (j, mut column) in out.column_iter_mut().enumerate() {
            // Constant training columns have zero scale and are only centered.
            let scale = if self.scale[j] == 0.0 { 1.0 } else { self.scale[j] };
            for v in column.iter_mut() {
                *v = (*v - self.mean[j]) / scale;
            }
        }
        Ok(out)
    }
}

/// Range scaling: `x * scale + min`
#[derive(Debug, Clone, Deserialize)]
pub struct MinMaxScaler {
    pub scale: Vec<f64>,
    pub min: Vec<f64>,
}

impl Scaler for MinMaxScaler {
    fn transform(&self, features: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        check_columns(features, self.scale.len(), "MinMaxScaler")?;
        if self.min.len() != self.scale.len() {
            return Err(ModelError::Failure(format!(
                "MinMaxScaler has {} scales but {} offsets",
                self.scale.len(),
                self.min.len()
            )));
        }
        check_finite(features)?;

        let mut out = features.clone();
        for (j, mut column) in out.column_iter_mut().enumerate() {
            for v in column.iter_mut() {
                *v = *v * self.scale[j] + self.min[j];
            }
        }
        Ok(out)
    }
}

#[derive(Deserialize)]
#[serde(tag = "model_type")]
enum ClassifierArtifact {
    LogisticRegression(LogisticRegression),
}

impl ClassifierArtifact {
    fn into_classifier(self) -> Arc<dyn Classifier> {
        match self {
            ClassifierArtifact::LogisticRegression(m) => Arc::new(m),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind")]
enum ScalerArtifact {
    StandardScaler(StandardScaler),
    MinMaxScaler(MinMaxScaler),
}

impl ScalerArtifact {
    fn into_scaler(self) -> Arc<dyn Scaler> {
        match self {
            ScalerArtifact::StandardScaler(s) => Arc::new(s),
            ScalerArtifact::MinMaxScaler(s) => Arc::new(s),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: display,
        source,
    })
}

pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, ArtifactError> {
    read_json::<ClassifierArtifact>(path).map(ClassifierArtifact::into_classifier)
}

pub fn load_scaler(path: &Path) -> Result<Arc<dyn Scaler>, ArtifactError> {
    read_json::<ScalerArtifact>(path).map(ScalerArtifact::into_scaler)
}

pub fn load_feature_names(path: &Path) -> Result<Vec<String>, ArtifactError> {
    read_json(path)
}

/// The three artifacts inference needs. Any of them may be absent.
#[derive(Debug, Clone, Default)]
pub struct ModelArtifacts {
    pub classifier: Option<Arc<dyn Classifier>>,
    pub scaler: Option<Arc<dyn Scaler>>,
    /// Feature names in the exact column order the scaler and classifier expect
    pub feature_names: Vec<String>,
}

impl ModelArtifacts {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        scaler: Arc<dyn Scaler>,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            classifier: Some(classifier),
            scaler: Some(scaler),
            feature_names,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_some() && self.scaler.is_some() && !self.feature_names.is_empty()
    }

    pub fn model_type(&self) -> Option<&str> {
        self.classifier.as_ref().map(|c| c.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_logistic_regression_probabilities() {
        let model = LogisticRegression {
            coefficients: vec![1.0, -1.0],
            intercept: 0.0,
        };
        let x = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 2.0, 0.0]);
        let proba = model.predict_proba(&x).unwrap();

        assert_eq!(proba.shape(), (2, 2));
        assert_relative_eq!(proba[(0, 1)], 0.5);
        assert_relative_eq!(proba[(1, 1)], 1.0 / (1.0 + (-2.0f64).exp()));
        assert_relative_eq!(proba[(1, 0)] + proba[(1, 1)], 1.0);
    }

    #[test]
    fn test_logistic_regression_rejects_wrong_width() {
        let model = LogisticRegression {
            coefficients: vec![1.0, 2.0, 3.0],
            intercept: 0.0,
        };
        let x = DMatrix::zeros(1, 2);
        assert!(matches!(
            model.predict_proba(&x),
            Err(ModelError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_standard_scaler() {
        let scaler = StandardScaler {
            mean: vec![50.0, 1.0],
            scale: vec![10.0, 0.0],
        };
        let x = DMatrix::from_row_slice(1, 2, &[70.0, 3.0]);
        let out = scaler.transform(&x).unwrap();
        assert_relative_eq!(out[(0, 0)], 2.0);
        assert_relative_eq!(out[(0, 1)], 2.0);
    }

    #[test]
    fn test_standard_scaler_rejects_nan() {
        let scaler = StandardScaler {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        let x = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert!(matches!(
            scaler.transform(&x),
            Err(ModelError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_min_max_scaler() {
        let scaler = MinMaxScaler {
            scale: vec![0.01],
            min: vec![0.0],
        };
        let x = DMatrix::from_row_slice(2, 1, &[0.0, 100.0]);
        let out = scaler.transform(&x).unwrap();
        assert_relative_eq!(out[(1, 0)], 1.0);
    }

    #[test]
    fn test_load_tagged_artifacts() {
        let dir = tempfile::tempdir().unwrap();

        let model_path = dir.path().join(MODEL_FILENAME);
        let mut f = std::fs::File::create(&model_path).unwrap();
        write!(
            f,
            r#"{{"model_type":"LogisticRegression","coefficients":[0.5],"intercept":-1.0}}"#
        )
        .unwrap();
        let classifier = load_classifier(&model_path).unwrap();
        assert_eq!(classifier.type_name(), "LogisticRegression");

        let scaler_path = dir.path().join(SCALER_FILENAME);
        std::fs::write(&scaler_path, r#"{"kind":"MinMaxScaler","scale":[1.0],"min":[0.0]}"#)
            .unwrap();
        assert!(load_scaler(&scaler_path).is_ok());

        let unknown = dir.path().join("unknown.json");
        std::fs::write(&unknown, r#"{"model_type":"RandomForest"}"#).unwrap();
        assert!(matches!(
            load_classifier(&unknown),
            Err(ArtifactError::Parse { .. })
        ));
    }

    #[test]
    fn test_artifacts_readiness() {
        assert!(!ModelArtifacts::default().is_ready());

        let ready = ModelArtifacts::new(
            Arc::new(LogisticRegression {
                coefficients: vec![1.0],
                intercept: 0.0,
            }),
            Arc::new(StandardScaler {
                mean: vec![0.0],
                scale: vec![1.0],
            }),
            vec!["test_1_score".to_string()],
        );
        assert!(ready.is_ready());
        assert_eq!(ready.model_type(), Some("LogisticRegression"));

        let no_names = ModelArtifacts {
            feature_names: Vec::new(),
            ..ready
        };
        assert!(!no_names.is_ready());
    }
}
