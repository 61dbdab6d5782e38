//! Greedy CTC speech-to-text for NeMo FastConformer models
//!
//! ## Features
//!
//! - Log-mel front end from `nemo-ctc-features` (band-major `[1, 80, T]`)
//! - Frame-count guard in front of every inference call
//! - ONNX Runtime backend (CPU or CUDA) behind the [`AcousticModel`] trait
//! - Greedy CTC decoding with SentencePiece word boundaries
//! - TOML configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use nemo_ctc_stt::{AudioBuffer, CtcRecognizer, SttConfig};
//!
//! let config = SttConfig {
//!     model_path: "models/fastconformer-ctc/model.onnx".into(),
//!     vocab_path: "models/fastconformer-ctc/vocab.txt".into(),
//!     ..Default::default()
//! };
//! let mut recognizer = CtcRecognizer::from_config(&config)?;
//!
//! let audio = AudioBuffer::new(vec![0.0; 16000], 16000);
//! let result = recognizer.recognize(&audio)?;
//! println!("Transcription: {}", result.text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod recognizer;
pub mod recognizer_ort; // ONNX Runtime backend
pub mod vocabulary;

pub use config::SttConfig;
pub use decoder::{CtcDecoding, CtcState, GreedyCtcDecoder};
pub use engine::{AcousticModel, EngineInput, EngineOutput};
pub use error::{Result, SttError};
pub use recognizer::{build_extractor, CtcRecognizer, RecognitionResult};
pub use recognizer_ort::OrtCtcModel;
pub use vocabulary::Vocabulary;

pub use nemo_ctc_features::{AudioBuffer, FeatureConfig, FeatureExtractor, FeatureTensor};
