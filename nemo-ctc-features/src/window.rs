//! Analysis windows

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Window applied to each frame before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowShape {
    /// Symmetric Hann: `0.5 - 0.5 * cos(2*pi*i / (N - 1))`
    Hann,
    Hamming,
    /// Kaldi's Povey window: Hann raised to the power 0.85
    Povey,
    Rectangular,
}

impl WindowShape {
    pub const ALL: [WindowShape; 4] = [
        WindowShape::Hann,
        WindowShape::Hamming,
        WindowShape::Povey,
        WindowShape::Rectangular,
    ];

    /// Window coefficients for a window of `length` samples
    pub fn coefficients(self, length: usize) -> Vec<f32> {
        if length == 1 {
            return vec![1.0];
        }
        let denom = length.saturating_sub(1) as f32;
        (0..length)
            .map(|n| {
                let factor = 2.0 * PI * n as f32 / denom;
                match self {
                    WindowShape::Hann => 0.5 - 0.5 * factor.cos(),
                    WindowShape::Hamming => 0.54 - 0.46 * factor.cos(),
                    WindowShape::Povey => (0.5 - 0.5 * factor.cos()).powf(0.85),
                    WindowShape::Rectangular => 1.0,
                }
            })
            .collect()
    }
}
