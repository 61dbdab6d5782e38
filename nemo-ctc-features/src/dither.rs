//! Gaussian dither
//!
//! A tiny amount of zero-mean noise is added to every sample once per
//! utterance before framing, matching the NeMo preprocessor (`dither=1e-5`).
//! It keeps silent frames away from exact zeros. With a fixed seed the noise
//! sequence is reproducible.

use crate::error::{FeatureError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub struct Dither {
    normal: Option<Normal<f32>>,
    rng: StdRng,
}

impl Dither {
    /// `amplitude` is the standard deviation of the noise; zero disables it
    pub fn new(amplitude: f32, seed: Option<u64>) -> Result<Self> {
        let normal = if amplitude > 0.0 {
            Some(Normal::new(0.0, amplitude).map_err(|e| {
                FeatureError::config(format!("invalid dither amplitude {}: {}", amplitude, e))
            })?)
        } else if amplitude == 0.0 {
            None
        } else {
            return Err(FeatureError::config(format!(
                "dither must be non-negative, got {}",
                amplitude
            )));
        };

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self { normal, rng })
    }

    pub fn is_enabled(&self) -> bool {
        self.normal.is_some()
    }

    /// Add noise to every sample in place
    pub fn apply(&mut self, samples: &mut [f32]) {
        if let Some(normal) = &self.normal {
            for sample in samples.iter_mut() {
                *sample += normal.sample(&mut self.rng);
            }
        }
    }
}
