//! Log-mel filterbank front end for NeMo FastConformer CTC models
//!
//! Turns 16 kHz mono audio into the band-major `[1, n_mels, frames]` tensor
//! the exported encoder expects, bit-for-bit reproducible given a seed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nemo_ctc_features::{AudioBuffer, FeatureConfig, FeatureExtractor};
//!
//! let mut extractor = FeatureExtractor::new(FeatureConfig::default())?;
//! let audio = AudioBuffer::silence(48000, 16000);
//! let features = extractor.extract(&audio)?;
//! assert_eq!(features.frame_count(), 301);
//! # Ok::<(), nemo_ctc_features::FeatureError>(())
//! ```

pub mod audio;
pub mod config;
pub mod dither;
pub mod error;
pub mod extractor;
pub mod filterbank;
pub mod normalize;
pub mod spectrum;
pub mod stats;
pub mod tensor;
pub mod window;

pub use audio::AudioBuffer;
pub use config::{FeatureConfig, Framing, LogBase, LogGuard, NormalizeMode, StdGuard};
pub use error::{FeatureError, Result};
pub use extractor::FeatureExtractor;
pub use filterbank::MelFilterbank;
pub use normalize::{LogCompression, Normalizer};
pub use stats::NormalizationStats;
pub use tensor::FeatureTensor;
pub use window::WindowShape;
