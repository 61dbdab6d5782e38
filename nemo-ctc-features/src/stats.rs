//! Global normalization statistics
//!
//! Per-band running mean and variance plus the number of frames they were
//! accumulated from. The artifact is JSON:
//!
//! ```json
//! {"mean_stat": [9.87, ...], "var_stat": [2.67, ...], "frame_num": 54068199}
//! ```
//!
//! Stats are an immutable value: [`NormalizationStats::combine`] and
//! [`NormalizationStats::update`] return a new value using the parallel
//! mean/variance merge (Chan et al.).

use crate::error::{FeatureError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    /// Mean of each band
    #[serde(rename = "mean_stat", alias = "mean_per_band")]
    mean: Vec<f32>,
    /// Population variance of each band
    #[serde(rename = "var_stat", alias = "variance_per_band")]
    variance: Vec<f32>,
    /// Number of frames the statistics were computed from
    #[serde(rename = "frame_num", alias = "frame_count")]
    frame_count: u64,
}

impl NormalizationStats {
    pub fn new(mean: Vec<f32>, variance: Vec<f32>, frame_count: u64) -> Result<Self> {
        let stats = Self {
            mean,
            variance,
            frame_count,
        };
        stats.check()?;
        Ok(stats)
    }

    /// Statistics of a frame-major `(frames, bands)` feature matrix
    pub fn from_frames(frames: &Array2<f32>) -> Result<Self> {
        let n = frames.nrows();
        if n == 0 {
            return Err(FeatureError::stats("cannot compute statistics from zero frames"));
        }
        let mut mean = Vec::with_capacity(frames.ncols());
        let mut variance = Vec::with_capacity(frames.ncols());
        for column in frames.axis_iter(Axis(1)) {
            let m = column.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
            let v = column.iter().map(|&x| (x as f64 - m).powi(2)).sum::<f64>() / n as f64;
            mean.push(m as f32);
            variance.push(v as f32);
        }
        Self::new(mean, variance, n as u64)
    }

    /// Load stats from a JSON artifact
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            FeatureError::stats(format!("Failed to read stats file {}: {}", path.display(), e))
        })?;
        let stats = Self::from_json(&contents)?;
        info!(
            "Loaded normalization stats: {} bands, {} frames from {}",
            stats.num_bands(),
            stats.frame_count,
            path.display()
        );
        Ok(stats)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let stats: Self = serde_json::from_str(contents)?;
        stats.check()?;
        Ok(stats)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write stats as a JSON artifact
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(FeatureError::stats("stats have no bands"));
        }
        if self.mean.len() != self.variance.len() {
            return Err(FeatureError::stats(format!(
                "mean has {} bands but variance has {}",
                self.mean.len(),
                self.variance.len()
            )));
        }
        if let Some(band) = self
            .variance
            .iter()
            .position(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(FeatureError::stats(format!(
                "variance of band {} is invalid: {}",
                band, self.variance[band]
            )));
        }
        if let Some(band) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(FeatureError::stats(format!("mean of band {} is not finite", band)));
        }
        Ok(())
    }

    pub fn num_bands(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn variance(&self) -> &[f32] {
        &self.variance
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Standard deviation per band, zero replaced by one so a dead band
    /// passes through unscaled
    pub fn std_dev(&self) -> Vec<f32> {
        self.variance
            .iter()
            .map(|&v| {
                let std = v.sqrt();
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            })
            .collect()
    }

    /// Merge two sets of statistics as if accumulated over both corpora
    pub fn combine(&self, other: &Self) -> Result<Self> {
        if self.num_bands() != other.num_bands() {
            return Err(FeatureError::stats(format!(
                "cannot combine stats with {} and {} bands",
                self.num_bands(),
                other.num_bands()
            )));
        }
        if other.frame_count == 0 {
            return Ok(self.clone());
        }
        if self.frame_count == 0 {
            return Ok(other.clone());
        }

        let na = self.frame_count as f64;
        let nb = other.frame_count as f64;
        let n = na + nb;

        let mut mean = Vec::with_capacity(self.num_bands());
        let mut variance = Vec::with_capacity(self.num_bands());
        for band in 0..self.num_bands() {
            let (ma, mb) = (self.mean[band] as f64, other.mean[band] as f64);
            let (va, vb) = (self.variance[band] as f64, other.variance[band] as f64);
            let delta = mb - ma;
            let m = ma + delta * nb / n;
            let m2 = va * na + vb * nb + delta * delta * na * nb / n;
            mean.push(m as f32);
            variance.push((m2 / n) as f32);
        }

        Self::new(mean, variance, self.frame_count + other.frame_count)
    }

    /// Fold a frame-major `(frames, bands)` feature matrix into the stats
    pub fn update(&self, frames: &Array2<f32>) -> Result<Self> {
        if frames.nrows() == 0 {
            return Ok(self.clone());
        }
        self.combine(&Self::from_frames(frames)?)
    }
}
