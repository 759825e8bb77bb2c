use thiserror::Error;

/// Errors raised while scaling or scoring a feature matrix
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Input shape or values the model cannot accept
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Model failure: {0}")]
    Failure(String),
}

/// Errors raised while reading an artifact file
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;
