//! Log compression and per-band normalization
//!
//! All functions here operate on frame-major `(frames, bands)` matrices; the
//! band-major engine layout is produced afterwards by the tensor assembler.

use crate::config::{FeatureConfig, LogBase, LogGuard, NormalizeMode, StdGuard};
use crate::error::{FeatureError, Result};
use crate::stats::NormalizationStats;
use ndarray::{Array2, Axis};
use std::sync::Arc;

/// `log(guard(x))` applied element-wise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogCompression {
    pub base: LogBase,
    pub guard: LogGuard,
    pub guard_value: f32,
}

impl LogCompression {
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self {
            base: config.log_base,
            guard: config.log_guard,
            guard_value: config.log_zero_guard_value,
        }
    }

    pub fn apply_scalar(&self, energy: f32) -> f32 {
        self.base.apply(self.guard.apply(energy, self.guard_value))
    }

    /// Value produced for a frame with zero energy
    pub fn floor(&self) -> f32 {
        self.apply_scalar(0.0)
    }

    pub fn apply(&self, mel: &mut Array2<f32>) {
        mel.mapv_inplace(|x| self.apply_scalar(x));
    }
}

/// Normalization resolved once for the lifetime of a pipeline
#[derive(Debug, Clone)]
pub enum Normalizer {
    None,
    PerFeature {
        epsilon: f32,
        guard: StdGuard,
    },
    Global {
        stats: Arc<NormalizationStats>,
        std_dev: Vec<f32>,
    },
}

impl Normalizer {
    /// Build the normalizer for `mode`. Global mode requires stats with
    /// exactly `n_mels` bands.
    pub fn new(
        mode: NormalizeMode,
        epsilon: f32,
        stats: Option<Arc<NormalizationStats>>,
        n_mels: usize,
    ) -> Result<Self> {
        match mode {
            NormalizeMode::None => Ok(Normalizer::None),
            NormalizeMode::PerFeature => Ok(Normalizer::PerFeature {
                epsilon,
                guard: StdGuard::Add,
            }),
            NormalizeMode::Global => {
                let stats = stats.ok_or_else(|| {
                    FeatureError::config("global normalization requires normalization stats")
                })?;
                if stats.num_bands() != n_mels {
                    return Err(FeatureError::config(format!(
                        "normalization stats have {} bands, features have {}",
                        stats.num_bands(),
                        n_mels
                    )));
                }
                let std_dev = stats.std_dev();
                Ok(Normalizer::Global { stats, std_dev })
            }
        }
    }

    /// Select how the per-feature standard deviation is guarded; other
    /// modes are unaffected
    pub fn with_std_guard(self, guard: StdGuard) -> Self {
        match self {
            Normalizer::PerFeature { epsilon, .. } => Normalizer::PerFeature { epsilon, guard },
            other => other,
        }
    }

    pub fn mode(&self) -> NormalizeMode {
        match self {
            Normalizer::None => NormalizeMode::None,
            Normalizer::PerFeature { .. } => NormalizeMode::PerFeature,
            Normalizer::Global { .. } => NormalizeMode::Global,
        }
    }

    /// Normalize a frame-major `(frames, bands)` matrix in place
    pub fn apply(&self, features: &mut Array2<f32>) -> Result<()> {
        match self {
            Normalizer::None => Ok(()),
            Normalizer::PerFeature { epsilon, guard } => {
                normalize_per_feature(features, *epsilon, *guard);
                Ok(())
            }
            Normalizer::Global { stats, std_dev } => {
                if features.ncols() != stats.num_bands() {
                    return Err(FeatureError::extraction(format!(
                        "features have {} bands, stats have {}",
                        features.ncols(),
                        stats.num_bands()
                    )));
                }
                for mut frame in features.axis_iter_mut(Axis(0)) {
                    for ((x, &mean), &std) in
                        frame.iter_mut().zip(stats.mean()).zip(std_dev.iter())
                    {
                        *x = (*x - mean) / std;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Per-utterance normalization (NeMo `normalize="per_feature"`)
///
/// First pass computes each band's mean and sample standard deviation over
/// all frames; second pass applies `(x - mean) / guard(std, epsilon)`.
pub fn normalize_per_feature(features: &mut Array2<f32>, epsilon: f32, guard: StdGuard) {
    let n = features.nrows();
    if n == 0 {
        return;
    }

    let moments: Vec<(f32, f32)> = features
        .axis_iter(Axis(1))
        .map(|band| {
            let mean = band.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
            let var = if n > 1 {
                band.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / (n - 1) as f64
            } else {
                0.0
            };
            (mean as f32, var.sqrt() as f32)
        })
        .collect();

    for mut frame in features.axis_iter_mut(Axis(0)) {
        for (x, &(mean, std)) in frame.iter_mut().zip(moments.iter()) {
            *x = (*x - mean) / guard.apply(std, epsilon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOG_ZERO_GUARD;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn natural() -> LogCompression {
        LogCompression {
            base: LogBase::Natural,
            guard: LogGuard::Add,
            guard_value: LOG_ZERO_GUARD,
        }
    }

    #[test]
    fn test_silence_floor_is_finite() {
        for base in LogBase::ALL {
            for guard in LogGuard::ALL {
                let log = LogCompression {
                    base,
                    guard,
                    guard_value: LOG_ZERO_GUARD,
                };
                let mut mel = Array2::<f32>::zeros((3, 80));
                log.apply(&mut mel);
                assert!(mel.iter().all(|x| x.is_finite()));
                assert!(mel.iter().all(|&x| x == log.floor()));
            }
        }
        assert_eq!(natural().floor(), LOG_ZERO_GUARD.ln());
    }

    #[test]
    fn test_natural_log_not_log10() {
        let log = natural();
        assert_abs_diff_eq!(log.apply_scalar(std::f32::consts::E), 1.0, epsilon = 1e-6);
        let log10 = LogCompression {
            base: LogBase::Log10,
            ..natural()
        };
        assert_abs_diff_eq!(log10.apply_scalar(100.0), 2.0, epsilon = 1e-6);
        // ln(1e-10) ~ -23.03, log10(1e-10) = -10
        assert_abs_diff_eq!(log.floor(), -23.025_85, epsilon = 1e-3);
        assert_abs_diff_eq!(log10.floor(), -10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_clamp_versus_add_guard() {
        let add = natural();
        let clamp = LogCompression {
            guard: LogGuard::Clamp,
            ..natural()
        };
        assert_eq!(clamp.apply_scalar(1e-12), LOG_ZERO_GUARD.ln());
        assert_eq!(clamp.apply_scalar(2.0), 2.0f32.ln());
        assert!(add.apply_scalar(1e-12) > clamp.apply_scalar(1e-12));
    }

    #[test]
    fn test_per_feature_normalization() {
        let mut features = array![[1.0f32, 5.0], [2.0, 5.0], [3.0, 5.0]];
        normalize_per_feature(&mut features, 1e-5, StdGuard::Add);
        // Band 0: mean 2, sample std 1
        assert_abs_diff_eq!(features[[0, 0]], -1.0 / (1.0 + 1e-5), epsilon = 1e-6);
        assert_abs_diff_eq!(features[[1, 0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(features[[2, 0]], 1.0 / (1.0 + 1e-5), epsilon = 1e-6);
        // Constant band collapses to zero instead of blowing up
        assert!(features.column(1).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_floor_guard_versus_add_guard() {
        // Band std is sqrt(0.5) * 1e-6, well below epsilon
        let input = array![[0.0f32], [1e-6]];
        let mut floored = input.clone();
        normalize_per_feature(&mut floored, 1e-5, StdGuard::Floor);
        assert_abs_diff_eq!(floored[[0, 0]], -0.05, epsilon = 1e-4);

        let mut added = input.clone();
        normalize_per_feature(&mut added, 1e-5, StdGuard::Add);
        let std = 0.5f32.sqrt() * 1e-6;
        assert_abs_diff_eq!(added[[0, 0]], -0.5e-6 / (std + 1e-5), epsilon = 1e-4);
        assert!(added[[0, 0]] > floored[[0, 0]]);

        let normalizer = Normalizer::new(NormalizeMode::PerFeature, 1e-5, None, 1)
            .unwrap()
            .with_std_guard(StdGuard::Floor);
        let mut via_normalizer = input.clone();
        normalizer.apply(&mut via_normalizer).unwrap();
        assert_eq!(via_normalizer, floored);
    }

    #[test]
    fn test_per_feature_single_frame() {
        let mut features = array![[4.0f32, -3.0]];
        normalize_per_feature(&mut features, 1e-5, StdGuard::Add);
        assert_eq!(features, array![[0.0f32, 0.0]]);
    }

    #[test]
    fn test_per_feature_empty() {
        let mut features = Array2::<f32>::zeros((0, 80));
        normalize_per_feature(&mut features, 1e-5, StdGuard::Add);
        assert_eq!(features.shape(), &[0, 80]);
    }

    #[test]
    fn test_global_normalization_is_deterministic() {
        let stats = Arc::new(NormalizationStats::new(vec![1.0, -1.0], vec![4.0, 0.25], 100).unwrap());
        let normalizer = Normalizer::new(NormalizeMode::Global, 1e-5, Some(stats), 2).unwrap();
        let input = array![[3.0f32, 0.0], [1.0, -1.5]];

        let mut first = input.clone();
        normalizer.apply(&mut first).unwrap();
        let mut second = input.clone();
        normalizer.apply(&mut second).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, array![[1.0f32, 2.0], [0.0, -1.0]]);
    }

    #[test]
    fn test_global_requires_matching_stats() {
        let stats = Arc::new(NormalizationStats::new(vec![1.0], vec![1.0], 1).unwrap());
        assert!(Normalizer::new(NormalizeMode::Global, 1e-5, None, 80).is_err());
        assert!(Normalizer::new(NormalizeMode::Global, 1e-5, Some(stats), 80).is_err());
    }

    #[test]
    fn test_none_is_identity() {
        let normalizer = Normalizer::new(NormalizeMode::None, 1e-5, None, 2).unwrap();
        let mut features = array![[3.0f32, 0.0]];
        normalizer.apply(&mut features).unwrap();
        assert_eq!(features, array![[3.0f32, 0.0]]);
        assert_eq!(normalizer.mode(), NormalizeMode::None);
    }
}
