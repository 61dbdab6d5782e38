//! Mel filterbank construction and projection
//!
//! The filterbank is a fixed `(n_mels, n_fft/2 + 1)` matrix of triangular
//! weights in HTK mel space. It is pure data: identical parameters always give
//! a bit-identical matrix, so one instance is built per process and shared
//! between pipelines behind an `Arc`.

use crate::config::FeatureConfig;
use crate::error::{FeatureError, Result};
use ndarray::{Array2, ArrayView1};
use tracing::debug;

/// Convert Hz to mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel scale to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank
#[derive(Debug, Clone, PartialEq)]
pub struct MelFilterbank {
    weights: Array2<f32>,
    /// `n_mels + 2` band edges in Hz
    edges_hz: Vec<f64>,
    sample_rate: f32,
    n_fft: usize,
}

impl MelFilterbank {
    /// Build the filterbank described by a validated feature configuration
    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        Self::new(
            config.n_mels,
            config.n_fft,
            config.sample_rate as f32,
            config.low_freq,
            config.resolved_high_freq(),
        )
    }

    /// Create mel filterbank matrix
    ///
    /// `n_mels + 2` points are placed equally spaced in mel between
    /// `low_freq` and `high_freq`; band `m` rises from point `m` to `m + 1`
    /// and falls to `m + 2`. FFT bin `k` sits at `k * sample_rate / n_fft` Hz.
    pub fn new(
        n_mels: usize,
        n_fft: usize,
        sample_rate: f32,
        low_freq: f32,
        high_freq: f32,
    ) -> Result<Self> {
        if n_mels == 0 {
            return Err(FeatureError::config("n_mels must be positive"));
        }
        if n_fft == 0 {
            return Err(FeatureError::config("n_fft must be positive"));
        }
        if !(sample_rate > 0.0) || !(low_freq >= 0.0) || !(high_freq > low_freq) {
            return Err(FeatureError::config(format!(
                "invalid filterbank range {}..{} Hz at {} Hz",
                low_freq, high_freq, sample_rate
            )));
        }

        let freq_bins = n_fft / 2 + 1;
        let mel_min = hz_to_mel(low_freq as f64);
        let mel_max = hz_to_mel(high_freq as f64);
        let edges_hz: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let bin_width = sample_rate as f64 / n_fft as f64;
        let mut weights = Array2::<f32>::zeros((n_mels, freq_bins));

        for mel_idx in 0..n_mels {
            let left = edges_hz[mel_idx];
            let center = edges_hz[mel_idx + 1];
            let right = edges_hz[mel_idx + 2];
            let rise = center - left;
            let fall = right - center;

            // Collapsed triangle: leave the row at zero
            if !(rise > 0.0) || !(fall > 0.0) {
                continue;
            }

            for freq_idx in 0..freq_bins {
                let freq = freq_idx as f64 * bin_width;
                let up = (freq - left) / rise;
                let down = (right - freq) / fall;
                let w = up.min(down);
                if w > 0.0 {
                    weights[[mel_idx, freq_idx]] = w as f32;
                }
            }
        }

        debug!(
            "Built mel filterbank: {} bands x {} bins, {:.1}-{:.1} Hz",
            n_mels, freq_bins, low_freq, high_freq
        );

        Ok(Self {
            weights,
            edges_hz,
            sample_rate,
            n_fft,
        })
    }

    /// Weight matrix, shape `(n_mels, n_fft/2 + 1)`
    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn n_mels(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_freq_bins(&self) -> usize {
        self.weights.ncols()
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Band edges in Hz (`n_mels + 2` points)
    pub fn edges_hz(&self) -> &[f64] {
        &self.edges_hz
    }

    pub fn row(&self, band: usize) -> ArrayView1<'_, f32> {
        self.weights.row(band)
    }

    /// Sum of the weights in one band
    pub fn row_sum(&self, band: usize) -> f32 {
        self.weights.row(band).sum()
    }

    /// Triangle area of a band divided by the bin width, i.e. the value the
    /// row sum approaches as the FFT resolution grows
    pub fn theoretical_row_sum(&self, band: usize) -> f64 {
        let bin_width = self.sample_rate as f64 / self.n_fft as f64;
        (self.edges_hz[band + 2] - self.edges_hz[band]) / (2.0 * bin_width)
    }

    /// Project power spectra onto the mel bands
    ///
    /// `power` is `(frames, n_fft/2 + 1)`; the result is `(frames, n_mels)`.
    pub fn project(&self, power: &Array2<f32>) -> Result<Array2<f32>> {
        if power.ncols() != self.n_freq_bins() {
            return Err(FeatureError::extraction(format!(
                "power spectrum has {} bins, filterbank expects {}",
                power.ncols(),
                self.n_freq_bins()
            )));
        }
        Ok(power.dot(&self.weights.t()))
    }
}
