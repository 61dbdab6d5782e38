//! Error types for STT operations

use nemo_ctc_features::FeatureError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SttError>;

#[derive(Error, Debug)]
pub enum SttError {
    #[error("Model loading error: {0}")]
    ModelLoadError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Vocabulary error: {0}")]
    VocabularyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Frame count handed to the engine disagrees with the feature tensor
    #[error("Shape mismatch: tensor has {actual} frames but {expected} were claimed")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Feature extraction error: {0}")]
    Features(FeatureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FeatureError> for SttError {
    fn from(err: FeatureError) -> Self {
        // Keep the two caller-visible contract failures distinguishable
        match err {
            FeatureError::ShapeMismatch { expected, actual } => {
                SttError::ShapeMismatch { expected, actual }
            }
            FeatureError::ConfigError(msg) => SttError::ConfigError(msg),
            other => SttError::Features(other),
        }
    }
}

impl SttError {
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoadError(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::InferenceError(msg.into())
    }

    pub fn vocabulary<S: Into<String>>(msg: S) -> Self {
        Self::VocabularyError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }
}
