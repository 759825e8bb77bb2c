use crate::artifacts::{
    load_classifier, load_feature_names, load_scaler, ModelArtifacts, FEATURE_NAMES_FILENAME,
    MODEL_FILENAME, SCALER_FILENAME,
};
use crate::error::ArtifactError;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Which artifacts made it into the store on the last load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub classifier: bool,
    pub scaler: bool,
    pub feature_names: bool,
    /// Set when a present file could not be read or parsed
    pub error: Option<String>,
}

impl LoadReport {
    pub fn success(&self) -> bool {
        self.classifier && self.scaler && self.feature_names && self.error.is_none()
    }
}

/// Process-wide holder for the loaded model artifacts.
///
/// Created once at startup and handed to every consumer by `Arc`. Readers get
/// an immutable snapshot; a reload swaps the whole set at once, so a reader
/// never sees classifier and scaler from different loads.
#[derive(Debug, Default)]
pub struct ModelStore {
    current: RwLock<Arc<ModelArtifacts>>,
}

impl ModelStore {
    /// A store in the "not loaded" state
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_artifacts(artifacts: ModelArtifacts) -> Self {
        Self {
            current: RwLock::new(Arc::new(artifacts)),
        }
    }

    /// Load the three artifacts from `dir`.
    ///
    /// A missing file leaves only that artifact absent. A file that exists but
    /// cannot be read or parsed clears every artifact, so inference never runs
    /// with a half-consistent set.
    pub fn load_from_dir(&self, dir: impl AsRef<Path>) -> LoadReport {
        let dir = dir.as_ref();
        tracing::info!("Loading model artifacts from {}", dir.display());

        match read_artifacts(dir) {
            Ok(artifacts) => {
                let report = LoadReport {
                    classifier: artifacts.classifier.is_some(),
                    scaler: artifacts.scaler.is_some(),
                    feature_names: !artifacts.feature_names.is_empty(),
                    error: None,
                };
                if report.success() {
                    tracing::info!(
                        model_type = artifacts.model_type().unwrap_or("unknown"),
                        features = ?artifacts.feature_names,
                        "All model artifacts loaded"
                    );
                } else {
                    tracing::warn!(
                        classifier = report.classifier,
                        scaler = report.scaler,
                        feature_names = report.feature_names,
                        "One or more model artifacts missing; prediction will be unavailable"
                    );
                }
                self.replace(artifacts);
                report
            }
            Err(e) => {
                tracing::error!(error = %e, "Critical error loading model artifacts");
                self.replace(ModelArtifacts::default());
                LoadReport {
                    error: Some(e.to_string()),
                    ..LoadReport::default()
                }
            }
        }
    }

    /// Load from `dir` and report whether the store is now ready to predict.
    pub fn load_artifacts(&self, dir: impl AsRef<Path>) -> bool {
        self.load_from_dir(dir).success()
    }

    /// Swap in a complete artifact set.
    pub fn replace(&self, artifacts: ModelArtifacts) {
        let fresh = Arc::new(artifacts);
        match self.current.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    pub fn snapshot(&self) -> Arc<ModelArtifacts> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ready()
    }

    pub fn model_type(&self) -> Option<String> {
        self.snapshot().model_type().map(str::to_string)
    }
}

fn read_artifacts(dir: &Path) -> Result<ModelArtifacts, ArtifactError> {
    let mut artifacts = ModelArtifacts::default();

    let model_path = dir.join(MODEL_FILENAME);
    if model_path.exists() {
        artifacts.classifier = Some(load_classifier(&model_path)?);
        tracing::info!("Classifier loaded from {}", model_path.display());
    } else {
        tracing::warn!("Classifier file not found at {}", model_path.display());
    }

    let scaler_path = dir.join(SCALER_FILENAME);
    if scaler_path.exists() {
        artifacts.scaler = Some(load_scaler(&scaler_path)?);
        tracing::info!("Scaler loaded from {}", scaler_path.display());
    } else {
        tracing::warn!("Scaler file not found at {}", scaler_path.display());
    }

    let names_path = dir.join(FEATURE_NAMES_FILENAME);
    if names_path.exists() {
        artifacts.feature_names = load_feature_names(&names_path)?;
        tracing::info!("Feature names loaded from {}", names_path.display());
    } else {
        tracing::warn!("Feature names file not found at {}", names_path.display());
    }

    Ok(artifacts)
}
