//! Feature extractor configuration
//!
//! Every historical variant of the front end (framing convention, log base,
//! zero guard, normalization) is an explicit enum resolved once when the
//! extractor is built. Each enum exposes `ALL` so the combinations can be
//! enumerated.

use crate::error::{FeatureError, Result};
use crate::window::WindowShape;
use serde::{Deserialize, Serialize};

/// Target sample rate for NeMo FastConformer models
pub const SAMPLE_RATE: u32 = 16000;

/// Mel-spectrogram parameters for NeMo FastConformer CTC models
pub const N_MEL_FEATURES: usize = 80; // Number of mel filters
pub const N_FFT: usize = 512; // FFT size
pub const HOP_LENGTH: usize = 160; // 10ms hop at 16kHz
pub const WIN_LENGTH: usize = 400; // 25ms window at 16kHz
pub const DITHER: f32 = 1e-5;
pub const LOG_ZERO_GUARD: f32 = 1e-10;
pub const NORM_EPSILON: f32 = 1e-5;

/// How frames are laid over the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Reflect-pad `n_fft / 2` samples on both sides; frame `i` is centered
    /// on sample `i * hop`. Matches librosa/torch `center=True`, which is what
    /// NeMo uses.
    Centered,
    /// Frames start at `i * hop` and must fit entirely inside the signal
    /// (Kaldi `snip_edges=true`). A trailing partial window is dropped.
    Valid,
}

impl Framing {
    pub const ALL: [Framing; 2] = [Framing::Centered, Framing::Valid];

    /// Number of frames produced for a signal of `num_samples` samples.
    ///
    /// Centered: `1 + num_samples / hop` (zero for an empty signal).
    /// Valid: `1 + (num_samples - win_length) / hop`, zero when the signal is
    /// shorter than one window.
    pub fn num_frames(self, num_samples: usize, win_length: usize, hop_length: usize) -> usize {
        if num_samples == 0 || hop_length == 0 {
            return 0;
        }
        match self {
            Framing::Centered => 1 + num_samples / hop_length,
            Framing::Valid => match num_samples.checked_sub(win_length) {
                Some(rest) => 1 + rest / hop_length,
                None => 0,
            },
        }
    }
}

/// Logarithm applied to mel energies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBase {
    /// Natural log (NeMo, librosa pipelines)
    Natural,
    Log10,
}

impl LogBase {
    pub const ALL: [LogBase; 2] = [LogBase::Natural, LogBase::Log10];

    pub fn apply(self, x: f32) -> f32 {
        match self {
            LogBase::Natural => x.ln(),
            LogBase::Log10 => x.log10(),
        }
    }
}

/// Guard that keeps the logarithm away from zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogGuard {
    /// `log(x + guard)`
    Add,
    /// `log(max(x, guard))`
    Clamp,
}

impl LogGuard {
    pub const ALL: [LogGuard; 2] = [LogGuard::Add, LogGuard::Clamp];

    pub fn apply(self, x: f32, guard: f32) -> f32 {
        match self {
            LogGuard::Add => x + guard,
            LogGuard::Clamp => x.max(guard),
        }
    }
}

/// How the per-feature standard deviation is kept away from zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdGuard {
    /// `std + epsilon` (NeMo `normalize_batch`)
    Add,
    /// `max(std, epsilon)`
    Floor,
}

impl StdGuard {
    pub const ALL: [StdGuard; 2] = [StdGuard::Add, StdGuard::Floor];

    pub fn apply(self, std: f32, epsilon: f32) -> f32 {
        match self {
            StdGuard::Add => std + epsilon,
            StdGuard::Floor => std.max(epsilon),
        }
    }
}

/// Per-band normalization of the log-mel features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Pass log-mel through unchanged
    None,
    /// Mean/std computed across the frames of the current utterance
    PerFeature,
    /// Mean/variance loaded from a precomputed statistics artifact
    Global,
}

impl NormalizeMode {
    pub const ALL: [NormalizeMode; 3] = [
        NormalizeMode::None,
        NormalizeMode::PerFeature,
        NormalizeMode::Global,
    ];
}

/// Feature extractor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// FFT size
    pub n_fft: usize,
    /// Window length in samples
    pub win_length: usize,
    /// Hop length in samples
    pub hop_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Lower filterbank edge in Hz
    pub low_freq: f32,
    /// Upper filterbank edge in Hz. `None` means Nyquist; a negative value is
    /// an offset from Nyquist (Kaldi convention).
    pub high_freq: Option<f32>,
    /// Analysis window shape
    pub window: WindowShape,
    pub framing: Framing,
    pub log_base: LogBase,
    pub log_guard: LogGuard,
    pub log_zero_guard_value: f32,
    pub normalize: NormalizeMode,
    /// Guard value for the per-feature standard deviation
    pub norm_epsilon: f32,
    pub norm_std_guard: StdGuard,
    /// Standard deviation of the Gaussian dither; 0 disables it
    pub dither: f32,
    /// Seed for the dither generator; `None` seeds from the OS
    pub dither_seed: Option<u64>,
    /// Pre-emphasis coefficient (`y[n] = x[n] - a * x[n-1]`); NeMo CTC
    /// models are exported with pre-emphasis disabled
    pub preemphasis: Option<f32>,
    /// Subtract each frame's mean before windowing (Kaldi option)
    pub remove_dc_offset: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            n_fft: N_FFT,
            win_length: WIN_LENGTH, // 25ms at 16kHz
            hop_length: HOP_LENGTH, // 10ms at 16kHz
            n_mels: N_MEL_FEATURES,
            low_freq: 0.0,
            high_freq: None,
            window: WindowShape::Hann,
            framing: Framing::Centered,
            log_base: LogBase::Natural,
            log_guard: LogGuard::Add,
            log_zero_guard_value: LOG_ZERO_GUARD,
            // FastConformer CTC exports are trained with `normalize: NA`
            normalize: NormalizeMode::None,
            norm_epsilon: NORM_EPSILON,
            norm_std_guard: StdGuard::Add,
            dither: DITHER,
            dither_seed: None,
            preemphasis: None,
            remove_dc_offset: false,
        }
    }
}

impl FeatureConfig {
    /// Number of one-sided spectrum bins
    pub fn n_freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Upper filterbank edge after resolving `None` and negative offsets
    pub fn resolved_high_freq(&self) -> f32 {
        match self.high_freq {
            None => self.nyquist(),
            Some(hz) if hz < 0.0 => self.nyquist() + hz,
            Some(hz) => hz,
        }
    }

    /// Frames produced for `num_samples` samples under this configuration
    pub fn num_frames(&self, num_samples: usize) -> usize {
        self.framing
            .num_frames(num_samples, self.win_length, self.hop_length)
    }

    /// Reject parameter combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FeatureError::config("sample_rate must be positive"));
        }
        if self.n_fft == 0 {
            return Err(FeatureError::config("n_fft must be positive"));
        }
        if self.win_length == 0 {
            return Err(FeatureError::config("win_length must be positive"));
        }
        if self.win_length > self.n_fft {
            return Err(FeatureError::config(format!(
                "win_length ({}) must not exceed n_fft ({})",
                self.win_length, self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(FeatureError::config("hop_length must be positive"));
        }
        if self.n_mels == 0 {
            return Err(FeatureError::config("n_mels must be positive"));
        }

        let high = self.resolved_high_freq();
        if !(self.low_freq >= 0.0) {
            return Err(FeatureError::config(format!(
                "low_freq must be non-negative, got {}",
                self.low_freq
            )));
        }
        if !(high > self.low_freq) {
            return Err(FeatureError::config(format!(
                "high_freq ({}) must be greater than low_freq ({})",
                high, self.low_freq
            )));
        }
        if high > self.nyquist() {
            return Err(FeatureError::config(format!(
                "high_freq ({}) exceeds Nyquist ({})",
                high,
                self.nyquist()
            )));
        }

        if !(self.log_zero_guard_value > 0.0) {
            return Err(FeatureError::config(
                "log_zero_guard_value must be positive",
            ));
        }
        if !(self.norm_epsilon >= 0.0) {
            return Err(FeatureError::config("norm_epsilon must be non-negative"));
        }
        if !(self.dither >= 0.0) {
            return Err(FeatureError::config(format!(
                "dither must be non-negative, got {}",
                self.dither
            )));
        }
        if let Some(coef) = self.preemphasis {
            if !(0.0..1.0).contains(&coef) {
                return Err(FeatureError::config(format!(
                    "preemphasis must be in [0, 1), got {}",
                    coef
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FeatureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_freq_bins(), 257);
        assert_eq!(config.resolved_high_freq(), 8000.0);
    }

    #[test]
    fn test_default_front_end_matches_fastconformer_export() {
        let config = FeatureConfig::default();
        assert_eq!(config.normalize, NormalizeMode::None);
        assert_eq!(config.framing, Framing::Centered);
        assert_eq!(config.log_guard, LogGuard::Add);
        assert_eq!(config.norm_std_guard, StdGuard::Add);
        assert_eq!(config.n_mels, 80);

        let parsed: FeatureConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.normalize, NormalizeMode::None);
    }

    #[test]
    fn test_std_guard() {
        assert_eq!(StdGuard::Add.apply(0.5, 0.25), 0.75);
        assert_eq!(StdGuard::Floor.apply(0.5, 0.25), 0.5);
        assert_eq!(StdGuard::Floor.apply(0.0, 0.25), 0.25);
    }

    #[test]
    fn test_centered_frame_count_boundaries() {
        let (win, hop) = (WIN_LENGTH, HOP_LENGTH);
        assert_eq!(Framing::Centered.num_frames(0, win, hop), 0);
        assert_eq!(Framing::Centered.num_frames(1, win, hop), 1);
        assert_eq!(Framing::Centered.num_frames(win - 1, win, hop), 1 + 399 / 160);
        assert_eq!(Framing::Centered.num_frames(win, win, hop), 1 + 400 / 160);
        assert_eq!(Framing::Centered.num_frames(48000, win, hop), 301);
    }

    #[test]
    fn test_valid_frame_count_boundaries() {
        let (win, hop) = (WIN_LENGTH, HOP_LENGTH);
        assert_eq!(Framing::Valid.num_frames(0, win, hop), 0);
        assert_eq!(Framing::Valid.num_frames(win - 1, win, hop), 0);
        assert_eq!(Framing::Valid.num_frames(win, win, hop), 1);
        assert_eq!(Framing::Valid.num_frames(win + hop - 1, win, hop), 1);
        assert_eq!(Framing::Valid.num_frames(win + hop, win, hop), 2);
        assert_eq!(Framing::Valid.num_frames(16000, win, hop), 98);
    }

    #[test]
    fn test_rejects_window_longer_than_fft() {
        let config = FeatureConfig {
            win_length: 600,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FeatureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_zero_mel_bands() {
        let config = FeatureConfig {
            n_mels: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_high_freq_above_nyquist() {
        let config = FeatureConfig {
            high_freq: Some(9000.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_high_freq_is_offset_from_nyquist() {
        let config = FeatureConfig {
            high_freq: Some(-400.0),
            ..Default::default()
        };
        assert_eq!(config.resolved_high_freq(), 7600.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_dither() {
        let config = FeatureConfig {
            dither: -1e-5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FeatureConfig =
            serde_json::from_str(r#"{"normalize": "global", "framing": "valid"}"#).unwrap();
        assert_eq!(config.normalize, NormalizeMode::Global);
        assert_eq!(config.framing, Framing::Valid);
        assert_eq!(config.n_mels, N_MEL_FEATURES);
        assert_eq!(config.log_base, LogBase::Natural);
    }
}
