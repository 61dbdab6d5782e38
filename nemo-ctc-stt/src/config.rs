//! Recognizer configuration (TOML)

use crate::error::{Result, SttError};
use nemo_ctc_features::{FeatureConfig, NormalizeMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_MODEL_PATH: &str = "models/fastconformer-ctc/model.onnx";
pub const DEFAULT_VOCAB_PATH: &str = "models/fastconformer-ctc/vocab.txt";

/// Configuration for a [`CtcRecognizer`](crate::CtcRecognizer)
///
/// ```toml
/// model_path = "models/fastconformer-ctc/model.onnx"
/// vocab_path = "models/fastconformer-ctc/vocab.txt"
/// num_threads = 4
/// use_gpu = false
///
/// [features]
/// n_mels = 80
/// normalize = "per_feature"
/// dither = 0.00001
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// ONNX model exported with `audio_signal`/`length` inputs
    pub model_path: PathBuf,

    /// Newline-delimited token list
    pub vocab_path: PathBuf,

    /// Global normalization stats JSON (required for `normalize = "global"`)
    pub stats_path: Option<PathBuf>,

    /// Blank token id (None = `<blk>` entry, else one past the last token)
    pub blank_id: Option<usize>,

    /// Intra-op threads for ONNX Runtime
    pub num_threads: usize,

    /// Try the CUDA execution provider first
    pub use_gpu: bool,

    /// Feature front end
    pub features: FeatureConfig,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            vocab_path: PathBuf::from(DEFAULT_VOCAB_PATH),
            stats_path: None,
            blank_id: None,
            num_threads: 4,
            use_gpu: false,
            features: FeatureConfig::default(),
        }
    }
}

impl SttConfig {
    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SttError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SttConfig = toml::from_str(contents)
            .map_err(|e| SttError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SttError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Write the configuration, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;

        if self.num_threads == 0 {
            return Err(SttError::config("num_threads must be at least 1"));
        }
        if self.features.normalize == NormalizeMode::Global && self.stats_path.is_none() {
            return Err(SttError::config(
                "normalize = \"global\" requires stats_path",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nemo_ctc_features::Framing;

    #[test]
    fn test_default_is_valid() {
        let config = SttConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.features.n_mels, 80);
        assert_eq!(config.blank_id, None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SttConfig::from_toml_str(
            r#"
            model_path = "/models/ctc.onnx"
            blank_id = 1024

            [features]
            framing = "valid"
            dither = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/ctc.onnx"));
        assert_eq!(config.blank_id, Some(1024));
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.features.framing, Framing::Valid);
        assert_eq!(config.features.dither, 0.0);
        assert_eq!(config.features.hop_length, 160);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(SttConfig::from_toml_str("num_threads = 0").is_err());
        assert!(SttConfig::from_toml_str("[features]\nhop_length = 0").is_err());
        assert!(SttConfig::from_toml_str("[features]\nnormalize = \"global\"").is_err());
        assert!(SttConfig::from_toml_str("[features]\nnormalize = \"sometimes\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("stt.toml");

        let config = SttConfig {
            stats_path: Some(PathBuf::from("/models/stats.json")),
            blank_id: Some(128),
            use_gpu: true,
            features: FeatureConfig {
                normalize: NormalizeMode::Global,
                dither_seed: Some(7),
                ..Default::default()
            },
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(SttConfig::load(&path).unwrap(), config);
    }
}
