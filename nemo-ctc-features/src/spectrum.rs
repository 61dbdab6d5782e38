//! Short-time power spectrum
//!
//! Frames the signal according to the configured [`Framing`], applies the
//! analysis window, zero-pads to `n_fft` and keeps the one-sided power
//! spectrum (`n_fft/2 + 1` bins).

use crate::config::{FeatureConfig, Framing};
use crate::error::Result;
use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

/// Windowed power-spectrum extractor
pub struct SpectrumExtractor {
    n_fft: usize,
    win_length: usize,
    hop_length: usize,
    framing: Framing,
    remove_dc_offset: bool,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumExtractor {
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        config.validate()?;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Ok(Self {
            n_fft: config.n_fft,
            win_length: config.win_length,
            hop_length: config.hop_length,
            framing: config.framing,
            remove_dc_offset: config.remove_dc_offset,
            window: config.window.coefficients(config.win_length),
            fft,
        })
    }

    /// Frames produced for `num_samples` samples
    pub fn num_frames(&self, num_samples: usize) -> usize {
        self.framing
            .num_frames(num_samples, self.win_length, self.hop_length)
    }

    pub fn n_freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Compute the power spectrogram, shape `(num_frames, n_fft/2 + 1)`
    pub fn power_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        let num_frames = self.num_frames(samples.len());
        let mut power = Array2::<f32>::zeros((num_frames, self.n_freq_bins()));
        if num_frames == 0 {
            return power;
        }

        // Source signal and where each frame's window starts within it
        let (signal, first_offset) = match self.framing {
            Framing::Centered => {
                let pad = self.n_fft / 2;
                (reflect_pad(samples, pad), (self.n_fft - self.win_length) / 2)
            }
            Framing::Valid => (samples.to_vec(), 0),
        };
        // Window placement inside the FFT buffer (centered like librosa)
        let buffer_offset = match self.framing {
            Framing::Centered => (self.n_fft - self.win_length) / 2,
            Framing::Valid => 0,
        };

        let mut frame = vec![0.0f32; self.win_length];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_length + first_offset;
            for (i, slot) in frame.iter_mut().enumerate() {
                *slot = signal.get(start + i).copied().unwrap_or(0.0);
            }

            if self.remove_dc_offset {
                let mean = frame.iter().sum::<f32>() / frame.len() as f32;
                frame.iter_mut().for_each(|x| *x -= mean);
            }

            buffer.fill(Complex::new(0.0, 0.0));
            for (i, (&x, &w)) in frame.iter().zip(self.window.iter()).enumerate() {
                buffer[buffer_offset + i] = Complex::new(x * w, 0.0);
            }

            self.fft.process(&mut buffer);

            for (bin, c) in buffer.iter().take(self.n_freq_bins()).enumerate() {
                power[[frame_idx, bin]] = c.re * c.re + c.im * c.im;
            }
        }

        debug!("Power spectrogram shape: {:?}", power.shape());
        power
    }
}

/// Mirror index `i` into `0..n` without repeating the edge sample
/// (numpy `mode="reflect"`). Indices further out than one signal length keep
/// bouncing between the edges, so arbitrarily short signals can be padded.
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Reflect-pad `pad` samples on each side of the signal
pub fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len();
    let pad = pad as isize;
    (-pad..n as isize + pad)
        .map(|i| samples[reflect_index(i, n)])
        .collect()
}

/// Apply preemphasis filter to audio signal
///
/// Formula: y[n] = x[n] - coef * x[n-1]
pub fn apply_preemphasis(audio: &mut [f32], coef: f32) {
    for i in (1..audio.len()).rev() {
        audio[i] -= coef * audio[i - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOP_LENGTH, N_FFT, WIN_LENGTH};
    use crate::window::WindowShape;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn extractor(framing: Framing) -> SpectrumExtractor {
        let config = FeatureConfig {
            framing,
            ..Default::default()
        };
        SpectrumExtractor::new(&config).unwrap()
    }

    #[test]
    fn test_reflect_pad_matches_numpy() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_reflect_pad_short_signal_bounces() {
        let padded = reflect_pad(&[1.0, 2.0], 3);
        assert_eq!(padded, vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0]);
        assert_eq!(reflect_pad(&[5.0], 2), vec![5.0; 5]);
        assert!(reflect_pad(&[], 4).is_empty());
    }

    #[test]
    fn test_centered_frame_counts() {
        let spec = extractor(Framing::Centered);
        for len in [0, 1, WIN_LENGTH - 1, WIN_LENGTH, 16000, 48000] {
            let expected = if len == 0 { 0 } else { 1 + len / HOP_LENGTH };
            let samples = vec![0.0; len];
            assert_eq!(spec.num_frames(len), expected);
            assert_eq!(spec.power_spectrogram(&samples).nrows(), expected);
        }
    }

    #[test]
    fn test_valid_frame_counts() {
        let spec = extractor(Framing::Valid);
        assert_eq!(spec.power_spectrogram(&vec![0.1; WIN_LENGTH - 1]).nrows(), 0);
        assert_eq!(spec.power_spectrogram(&vec![0.1; WIN_LENGTH]).nrows(), 1);
        assert_eq!(
            spec.power_spectrogram(&vec![0.1; 16000]).nrows(),
            1 + (16000 - WIN_LENGTH) / HOP_LENGTH
        );
    }

    #[test]
    fn test_silence_has_zero_power() {
        let spec = extractor(Framing::Centered);
        let power = spec.power_spectrogram(&vec![0.0; 3200]);
        assert_eq!(power.shape(), &[21, N_FFT / 2 + 1]);
        assert!(power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        // 1 kHz at 16 kHz with n_fft 512 lands exactly on bin 32
        let samples: Vec<f32> = (0..16000)
            .map(|n| (2.0 * PI * 1000.0 * n as f32 / 16000.0).sin())
            .collect();
        let power = extractor(Framing::Centered).power_spectrogram(&samples);
        let middle = power.row(power.nrows() / 2);
        let peak = middle
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
        assert_eq!(peak.0, 32);
    }

    #[test]
    fn test_power_matches_direct_dft() {
        let config = FeatureConfig {
            framing: Framing::Valid,
            window: WindowShape::Hann,
            ..Default::default()
        };
        let spec = SpectrumExtractor::new(&config).unwrap();
        let samples: Vec<f32> = (0..WIN_LENGTH).map(|n| ((n * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let power = spec.power_spectrogram(&samples);
        let window = WindowShape::Hann.coefficients(WIN_LENGTH);

        for k in [0usize, 5, 100, 256] {
            let (mut re, mut im) = (0.0f64, 0.0f64);
            for (i, (&x, &w)) in samples.iter().zip(window.iter()).enumerate() {
                let angle = -2.0 * std::f64::consts::PI * (k * i) as f64 / N_FFT as f64;
                re += (x * w) as f64 * angle.cos();
                im += (x * w) as f64 * angle.sin();
            }
            let expected = (re * re + im * im) as f32;
            assert_abs_diff_eq!(power[[0, k]], expected, epsilon = 1e-2 * expected.max(1.0));
        }
    }

    #[test]
    fn test_remove_dc_offset_kills_constant_signal() {
        let config = FeatureConfig {
            remove_dc_offset: true,
            framing: Framing::Valid,
            ..Default::default()
        };
        let spec = SpectrumExtractor::new(&config).unwrap();
        let power = spec.power_spectrogram(&vec![0.25; 1600]);
        assert!(power.iter().all(|&p| p.abs() < 1e-8));
    }

    #[test]
    fn test_preemphasis() {
        let mut audio = vec![1.0, 1.0, 0.5, 0.0];
        apply_preemphasis(&mut audio, 0.97);
        let expected = [1.0, 0.03, 0.5 - 0.97, -0.97 * 0.5];
        for (a, b) in audio.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
