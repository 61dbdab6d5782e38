//! Inference engine interface
//!
//! The encoder is an opaque synchronous call: band-major features plus their
//! frame count in, per-frame log-probabilities plus an encoded length out.
//! [`EngineInput`] can only be built once the frame count has been checked
//! against the tensor, so no engine ever sees a mismatched length.

use crate::error::{Result, SttError};
use nemo_ctc_features::FeatureTensor;
use ndarray::{s, Array2, ArrayView2};

/// Checked engine input: `audio_signal` `[1, n_mels, T]` and `length` `[T]`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInput {
    features: FeatureTensor,
}

impl EngineInput {
    /// Pair a tensor with the frame count that will be reported to the engine
    ///
    /// Returns [`SttError::ShapeMismatch`] when `claimed_frames` differs from
    /// the tensor's frame count.
    pub fn new(features: FeatureTensor, claimed_frames: usize) -> Result<Self> {
        features.check_frame_count(claimed_frames)?;
        Ok(Self { features })
    }

    pub fn features(&self) -> &FeatureTensor {
        &self.features
    }

    pub fn frame_count(&self) -> usize {
        self.features.frame_count()
    }

    /// Value of the `length` input
    pub fn length(&self) -> i64 {
        self.features.frame_count() as i64
    }

    pub fn into_features(self) -> FeatureTensor {
        self.features
    }
}

/// Encoder output for one utterance (batch dimension removed)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// `(T', vocab_size + 1)` log-probabilities
    log_probs: Array2<f32>,
    /// Frames of `log_probs` that belong to the utterance
    encoded_length: usize,
}

impl EngineOutput {
    pub fn new(log_probs: Array2<f32>, encoded_length: usize) -> Result<Self> {
        if encoded_length > log_probs.nrows() {
            return Err(SttError::inference(format!(
                "encoded length {} exceeds {} output frames",
                encoded_length,
                log_probs.nrows()
            )));
        }
        Ok(Self {
            log_probs,
            encoded_length,
        })
    }

    /// Output covering all frames
    pub fn full(log_probs: Array2<f32>) -> Self {
        let encoded_length = log_probs.nrows();
        Self {
            log_probs,
            encoded_length,
        }
    }

    pub fn log_probs(&self) -> ArrayView2<'_, f32> {
        self.log_probs.view()
    }

    pub fn encoded_length(&self) -> usize {
        self.encoded_length
    }

    pub fn num_classes(&self) -> usize {
        self.log_probs.ncols()
    }

    /// The first `encoded_length` frames
    pub fn valid_frames(&self) -> ArrayView2<'_, f32> {
        self.log_probs.slice(s![..self.encoded_length, ..])
    }
}

/// A CTC acoustic model
pub trait AcousticModel {
    fn infer(&mut self, input: &EngineInput) -> Result<EngineOutput>;

    /// Human readable description for logging
    fn model_info(&self) -> String {
        String::from("acoustic model")
    }
}

impl<M: AcousticModel + ?Sized> AcousticModel for Box<M> {
    fn infer(&mut self, input: &EngineInput) -> Result<EngineOutput> {
        (**self).infer(input)
    }

    fn model_info(&self) -> String {
        (**self).model_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(frames: usize) -> FeatureTensor {
        FeatureTensor::from_frame_major(&Array2::zeros((frames, 80)))
    }

    #[test]
    fn test_input_guard() {
        let input = EngineInput::new(tensor(301), 301).unwrap();
        assert_eq!(input.length(), 301);
        assert_eq!(input.features().input_shape(), [1, 80, 301]);

        match EngineInput::new(tensor(301), 300) {
            Err(SttError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, 300);
                assert_eq!(actual, 301);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
        assert!(EngineInput::new(tensor(301), 302).is_err());
    }

    #[test]
    fn test_output_valid_frames() {
        let output = EngineOutput::new(Array2::zeros((10, 5)), 7).unwrap();
        assert_eq!(output.valid_frames().dim(), (7, 5));
        assert_eq!(output.num_classes(), 5);
        assert_eq!(EngineOutput::full(Array2::zeros((4, 5))).encoded_length(), 4);
    }

    #[test]
    fn test_output_rejects_overlong_length() {
        assert!(matches!(
            EngineOutput::new(Array2::zeros((10, 5)), 11),
            Err(SttError::InferenceError(_))
        ));
    }
}
