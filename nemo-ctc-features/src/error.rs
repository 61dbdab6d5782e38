//! Error types for feature extraction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The frame count claimed for an engine call disagrees with the tensor.
    #[error("Shape mismatch: tensor has {actual} frames but {expected} were claimed")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Normalization stats error: {0}")]
    StatsError(String),

    #[error("Feature extraction error: {0}")]
    FeatureExtractionError(String),

    #[error("Stats serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn stats<S: Into<String>>(msg: S) -> Self {
        Self::StatsError(msg.into())
    }

    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::FeatureExtractionError(msg.into())
    }
}
