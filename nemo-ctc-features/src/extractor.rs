//! Log-mel feature extraction for NeMo FastConformer CTC models
//!
//! audio -> dither -> (pre-emphasis) -> windowed power spectrum -> mel
//! projection -> log -> normalization -> band-major tensor

use crate::audio::AudioBuffer;
use crate::config::FeatureConfig;
use crate::dither::Dither;
use crate::error::{FeatureError, Result};
use crate::filterbank::MelFilterbank;
use crate::normalize::{LogCompression, Normalizer};
use crate::spectrum::{apply_preemphasis, SpectrumExtractor};
use crate::stats::NormalizationStats;
use crate::tensor::FeatureTensor;
use ndarray::Array2;
use std::sync::Arc;
use tracing::{debug, info};

/// Feature extractor for one stream of utterances
///
/// The filterbank and global stats are immutable and may be shared between
/// extractors running on different threads; the dither generator is owned by
/// each extractor.
pub struct FeatureExtractor {
    config: FeatureConfig,
    spectrum: SpectrumExtractor,
    filterbank: Arc<MelFilterbank>,
    log: LogCompression,
    normalizer: Normalizer,
    dither: Dither,
}

impl FeatureExtractor {
    /// Create an extractor that builds its own filterbank
    ///
    /// Fails for `NormalizeMode::Global`, which needs stats; use
    /// [`FeatureExtractor::with_stats`] for that.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let filterbank = Arc::new(MelFilterbank::from_config(&config)?);
        Self::with_shared(config, filterbank, None)
    }

    /// Create an extractor using global normalization stats
    pub fn with_stats(config: FeatureConfig, stats: Arc<NormalizationStats>) -> Result<Self> {
        config.validate()?;
        let filterbank = Arc::new(MelFilterbank::from_config(&config)?);
        Self::with_shared(config, filterbank, Some(stats))
    }

    /// Create an extractor around an existing filterbank and optional stats
    pub fn with_shared(
        config: FeatureConfig,
        filterbank: Arc<MelFilterbank>,
        stats: Option<Arc<NormalizationStats>>,
    ) -> Result<Self> {
        config.validate()?;

        if filterbank.n_mels() != config.n_mels
            || filterbank.n_fft() != config.n_fft
            || filterbank.sample_rate() != config.sample_rate as f32
        {
            return Err(FeatureError::config(format!(
                "filterbank ({} bands, n_fft {}, {} Hz) does not match config ({} bands, n_fft {}, {} Hz)",
                filterbank.n_mels(),
                filterbank.n_fft(),
                filterbank.sample_rate(),
                config.n_mels,
                config.n_fft,
                config.sample_rate
            )));
        }

        let spectrum = SpectrumExtractor::new(&config)?;
        let normalizer =
            Normalizer::new(config.normalize, config.norm_epsilon, stats, config.n_mels)?
                .with_std_guard(config.norm_std_guard);
        let dither = Dither::new(config.dither, config.dither_seed)?;

        info!(
            "Feature extractor: {} mels, n_fft={}, win={}, hop={}, {:?} framing, {:?} window, {:?} log, {:?} normalization, dither={}",
            config.n_mels,
            config.n_fft,
            config.win_length,
            config.hop_length,
            config.framing,
            config.window,
            config.log_base,
            config.normalize,
            config.dither
        );

        Ok(Self {
            log: LogCompression::from_config(&config),
            config,
            spectrum,
            filterbank,
            normalizer,
            dither,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Shared filterbank, for building further extractors
    pub fn filterbank(&self) -> &Arc<MelFilterbank> {
        &self.filterbank
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Frames that `num_samples` samples will produce
    pub fn num_frames(&self, num_samples: usize) -> usize {
        self.config.num_frames(num_samples)
    }

    /// Extract band-major features from an audio buffer
    pub fn extract(&mut self, audio: &AudioBuffer) -> Result<FeatureTensor> {
        if audio.sample_rate() != self.config.sample_rate {
            return Err(FeatureError::config(format!(
                "audio is {} Hz but the extractor is configured for {} Hz",
                audio.sample_rate(),
                self.config.sample_rate
            )));
        }
        self.extract_samples(audio.samples())
    }

    /// Extract band-major features from raw samples at the configured rate
    pub fn extract_samples(&mut self, samples: &[f32]) -> Result<FeatureTensor> {
        let mut features = self.log_mel(samples)?;
        self.normalizer.apply(&mut features)?;

        let tensor = FeatureTensor::from_frame_major(&features);
        let expected = self.num_frames(samples.len());
        if tensor.frame_count() != expected {
            return Err(FeatureError::extraction(format!(
                "assembled {} frames for {} samples, expected {}",
                tensor.frame_count(),
                samples.len(),
                expected
            )));
        }

        debug!(
            "Extracted features: {} bands x {} frames ({:?} normalization)",
            tensor.n_mels(),
            tensor.frame_count(),
            self.normalizer.mode()
        );
        Ok(tensor)
    }

    /// Frame-major `(frames, n_mels)` log-mel features before normalization
    pub fn log_mel(&mut self, samples: &[f32]) -> Result<Array2<f32>> {
        if let Some(pos) = samples.iter().position(|x| !x.is_finite()) {
            return Err(FeatureError::extraction(format!(
                "sample {} is not finite",
                pos
            )));
        }
        debug!("Extracting log-mel from {} samples", samples.len());

        let mut signal = samples.to_vec();
        self.dither.apply(&mut signal);
        if let Some(coef) = self.config.preemphasis {
            apply_preemphasis(&mut signal, coef);
        }

        let power = self.spectrum.power_spectrogram(&signal);
        let mut mel = self.filterbank.project(&power)?;
        self.log.apply(&mut mel);

        if mel.nrows() > 0 {
            debug!(
                "Log-mel stats: min={:.6}, max={:.6}, mean={:.6}",
                mel.iter().fold(f32::INFINITY, |a, &b| a.min(b)),
                mel.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b)),
                mel.mean().unwrap_or(0.0)
            );
        }
        Ok(mel)
    }
}
