//! Band-major feature tensor
//!
//! NeMo encoders take `audio_signal` as `(batch, n_mels, time)`: all frames of
//! band 0, then all frames of band 1, and so on. [`FeatureTensor`] stores the
//! features in exactly that order together with the frame count that must be
//! sent alongside them. It never pads or truncates.

use crate::error::{FeatureError, Result};
use ndarray::{Array2, ArrayView2};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    /// `(n_mels, frames)` in standard (row-major) layout
    data: Array2<f32>,
}

impl FeatureTensor {
    /// Assemble from frame-major `(frames, n_mels)` features
    pub fn from_frame_major(frames: &Array2<f32>) -> Self {
        Self {
            data: frames.t().as_standard_layout().into_owned(),
        }
    }

    /// Wrap an existing band-major `(n_mels, frames)` matrix
    pub fn from_band_major(data: Array2<f32>) -> Self {
        Self {
            data: data.as_standard_layout().into_owned(),
        }
    }

    /// Rebuild from a flat band-major buffer
    pub fn from_band_major_vec(n_mels: usize, frame_count: usize, data: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((n_mels, frame_count), data).map_err(|e| {
            FeatureError::extraction(format!(
                "cannot shape buffer as ({}, {}): {}",
                n_mels, frame_count, e
            ))
        })?;
        Ok(Self { data })
    }

    pub fn n_mels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of frames, always the second dimension
    pub fn frame_count(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Band-major view, `(n_mels, frames)`
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Contiguous band-major buffer
    pub fn as_slice(&self) -> &[f32] {
        // Constructors only ever store standard-layout arrays
        self.data
            .as_slice()
            .unwrap_or_default()
    }

    /// Frame-major copy, `(frames, n_mels)`
    pub fn to_frame_major(&self) -> Array2<f32> {
        self.data.t().as_standard_layout().into_owned()
    }

    /// Feature vector of a single frame
    pub fn frame(&self, index: usize) -> Option<Vec<f32>> {
        (index < self.frame_count()).then(|| self.data.column(index).to_vec())
    }

    /// Engine input shape `[1, n_mels, frames]`
    pub fn input_shape(&self) -> [usize; 3] {
        [1, self.n_mels(), self.frame_count()]
    }

    /// Check a frame count about to be handed to an inference engine
    ///
    /// A length that disagrees with the tensor does not fail inside the
    /// encoder; it silently produces all-blank output. Reject it here.
    pub fn check_frame_count(&self, claimed: usize) -> Result<()> {
        if claimed != self.frame_count() {
            return Err(FeatureError::ShapeMismatch {
                expected: claimed,
                actual: self.frame_count(),
            });
        }
        Ok(())
    }

    /// Consume into `(shape, band-major data)`
    pub fn into_parts(self) -> ([usize; 3], Vec<f32>) {
        let shape = self.input_shape();
        let (data, _offset) = self.data.into_raw_vec_and_offset();
        (shape, data)
    }
}
