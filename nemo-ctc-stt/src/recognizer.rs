//! Speech recognition with NeMo CTC models
//!
//! audio -> [`FeatureExtractor`] -> checked [`EngineInput`] -> [`AcousticModel`]
//! -> [`GreedyCtcDecoder`] -> text

use crate::config::SttConfig;
use crate::decoder::{CtcDecoding, GreedyCtcDecoder};
use crate::engine::{AcousticModel, EngineInput};
use crate::error::{Result, SttError};
use crate::recognizer_ort::OrtCtcModel;
use crate::vocabulary::Vocabulary;
use nemo_ctc_features::{AudioBuffer, FeatureExtractor, FeatureTensor, NormalizationStats};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Recognition result
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    /// Transcribed text
    pub text: String,
    /// Emitted token ids
    pub token_ids: Vec<usize>,
    /// Per-token confidence (0.0 to 1.0)
    pub token_confidences: Vec<f32>,
    /// Mean frame confidence (0.0 to 1.0)
    pub avg_confidence: f32,
    /// Frames sent to the encoder
    pub feature_frames: usize,
    /// Encoder frames decoded
    pub encoded_frames: usize,
    /// Emissions dropped because their id was outside the vocabulary
    pub out_of_range: usize,
    /// Encoder frames with no finite log-prob
    pub degenerate_frames: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: f64,
}

impl RecognitionResult {
    fn from_decoding(decoding: CtcDecoding, feature_frames: usize, start: Instant) -> Self {
        Self {
            text: decoding.text,
            token_ids: decoding.token_ids,
            token_confidences: decoding.token_confidences,
            avg_confidence: decoding.avg_confidence,
            feature_frames,
            encoded_frames: decoding.frames,
            out_of_range: decoding.out_of_range,
            degenerate_frames: decoding.degenerate_frames,
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }
}

/// Single-utterance CTC recognizer
///
/// # Example
///
/// ```no_run
/// use nemo_ctc_stt::{AudioBuffer, CtcRecognizer, SttConfig};
///
/// let config = SttConfig::load("stt.toml")?;
/// let mut recognizer = CtcRecognizer::from_config(&config)?;
/// let result = recognizer.recognize(&AudioBuffer::silence(48000, 16000))?;
/// println!("Transcription: {}", result.text);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CtcRecognizer<M: AcousticModel> {
    extractor: FeatureExtractor,
    model: M,
    decoder: GreedyCtcDecoder,
}

impl CtcRecognizer<OrtCtcModel> {
    /// Build the extractor, ONNX Runtime model and vocabulary from a config
    pub fn from_config(config: &SttConfig) -> Result<Self> {
        config.validate()?;
        let extractor = build_extractor(config)?;
        let vocabulary = Vocabulary::from_file(&config.vocab_path, config.blank_id)?;
        let model = OrtCtcModel::from_config(config)?;
        Ok(Self::new(extractor, model, vocabulary))
    }
}

impl<M: AcousticModel> CtcRecognizer<M> {
    pub fn new(extractor: FeatureExtractor, model: M, vocabulary: Vocabulary) -> Self {
        info!(
            "CTC recognizer: {}, {} tokens, blank id {}",
            model.model_info(),
            vocabulary.len(),
            vocabulary.blank_id()
        );
        Self {
            extractor,
            model,
            decoder: GreedyCtcDecoder::new(vocabulary),
        }
    }

    /// Recognize one utterance
    pub fn recognize(&mut self, audio: &AudioBuffer) -> Result<RecognitionResult> {
        let start = Instant::now();
        let features = self.extractor.extract(audio)?;
        let claimed = self.extractor.num_frames(audio.len());
        self.run(features, claimed, start)
    }

    /// Recognize samples at the extractor's configured sample rate
    pub fn recognize_samples(&mut self, samples: &[f32]) -> Result<RecognitionResult> {
        let start = Instant::now();
        let features = self.extractor.extract_samples(samples)?;
        let claimed = self.extractor.num_frames(samples.len());
        self.run(features, claimed, start)
    }

    /// Run the engine on precomputed features
    ///
    /// `claimed_frames` is the length reported to the engine; it must match
    /// the tensor or [`SttError::ShapeMismatch`] is returned without calling
    /// the engine.
    pub fn recognize_features(
        &mut self,
        features: FeatureTensor,
        claimed_frames: usize,
    ) -> Result<RecognitionResult> {
        self.run(features, claimed_frames, Instant::now())
    }

    fn run(
        &mut self,
        features: FeatureTensor,
        claimed_frames: usize,
        start: Instant,
    ) -> Result<RecognitionResult> {
        let expected_mels = self.extractor.config().n_mels;
        if features.n_mels() != expected_mels {
            return Err(SttError::config(format!(
                "features have {} bands, model expects {}",
                features.n_mels(),
                expected_mels
            )));
        }

        let input = EngineInput::new(features, claimed_frames)?;
        let feature_frames = input.frame_count();

        if feature_frames == 0 {
            debug!("No frames to decode, skipping inference");
            return Ok(RecognitionResult::from_decoding(
                CtcDecoding::default(),
                0,
                start,
            ));
        }

        let output = self.model.infer(&input)?;
        let decoding = self.decoder.decode(output.valid_frames())?;
        let result = RecognitionResult::from_decoding(decoding, feature_frames, start);

        debug!(
            "Recognized {} frames -> {} encoder frames -> {} tokens in {:.1}ms",
            result.feature_frames,
            result.encoded_frames,
            result.token_ids.len(),
            result.processing_time_ms
        );
        Ok(result)
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn extractor_mut(&mut self) -> &mut FeatureExtractor {
        &mut self.extractor
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn decoder(&self) -> &GreedyCtcDecoder {
        &self.decoder
    }
}

/// Feature extractor for a config, loading global stats when configured
pub fn build_extractor(config: &SttConfig) -> Result<FeatureExtractor> {
    let extractor = match &config.stats_path {
        Some(path) => {
            let stats = Arc::new(NormalizationStats::from_file(path)?);
            FeatureExtractor::with_stats(config.features.clone(), stats)?
        }
        None => FeatureExtractor::new(config.features.clone())?,
    };
    Ok(extractor)
}
