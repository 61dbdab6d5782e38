//! ONNX Runtime backend for exported NeMo CTC models
//!
//! The model takes `audio_signal` `f32[1, n_mels, T]` (band-major) and
//! `length` `i64[1]`, and returns `log_probs` `f32[1, T', V+1]` followed by
//! `encoded_lengths` `i64[1]`. Exports that skip the preprocessor name the
//! inputs `processed_signal` and `processed_signal_length`; unnamed two-input
//! graphs are bound by position.
//!
//! ## Environment Setup
//!
//! `ort` is built with `load-dynamic`; point `ORT_DYLIB_PATH` at an ONNX
//! Runtime 1.22+ library:
//!
//! ```bash
//! export ORT_DYLIB_PATH=/path/to/libonnxruntime.so
//! ```

use crate::config::SttConfig;
use crate::engine::{AcousticModel, EngineInput, EngineOutput};
use crate::error::{Result, SttError};
use ndarray::Array2;
use ort::{
    execution_providers as ep,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SIGNAL_INPUTS: [&str; 2] = ["audio_signal", "processed_signal"];
const LENGTH_INPUTS: [&str; 2] = ["length", "processed_signal_length"];

pub struct OrtCtcModel {
    session: Session,
    signal_input: String,
    length_input: String,
    model_path: PathBuf,
    use_gpu: bool,
}

impl OrtCtcModel {
    /// Load a CTC model
    ///
    /// # Example
    /// ```no_run
    /// use nemo_ctc_stt::OrtCtcModel;
    ///
    /// let model = OrtCtcModel::new("models/fastconformer-ctc/model.onnx", 4, false)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new<P: AsRef<Path>>(model_path: P, num_threads: usize, use_gpu: bool) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        if !model_path.exists() {
            return Err(SttError::model_load(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        info!("Loading CTC model with ONNX Runtime: {}", model_path.display());

        let mut session_builder = Session::builder()
            .map_err(|e| SttError::model_load(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SttError::model_load(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads)
            .map_err(|e| SttError::model_load(format!("Failed to set intra threads: {}", e)))?;

        if use_gpu {
            info!("Enabling CUDA execution provider");
            session_builder = session_builder
                .with_execution_providers([
                    ep::CUDAExecutionProvider::default().build(),
                    ep::CPUExecutionProvider::default().build(),
                ])
                .map_err(|e| {
                    SttError::model_load(format!("Failed to set execution providers: {}", e))
                })?;
        } else {
            info!("Using CPU execution provider");
        }

        let session = session_builder
            .commit_from_file(&model_path)
            .map_err(|e| SttError::model_load(format!("Failed to load model: {}", e)))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        info!("Model inputs: {:?}", input_names);
        let (signal_input, length_input) = resolve_input_names(&input_names)?;
        debug!("Binding signal to '{}', length to '{}'", signal_input, length_input);
        if session.outputs.len() < 2 {
            warn!("Model has no encoded_lengths output; all output frames will be decoded");
        }

        Ok(Self {
            session,
            signal_input,
            length_input,
            model_path,
            use_gpu,
        })
    }

    pub fn from_config(config: &SttConfig) -> Result<Self> {
        Self::new(&config.model_path, config.num_threads, config.use_gpu)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl AcousticModel for OrtCtcModel {
    fn infer(&mut self, input: &EngineInput) -> Result<EngineOutput> {
        let [batch, n_mels, frames] = input.features().input_shape();
        debug!("Encoder input: ({}, {}, {})", batch, n_mels, frames);

        let audio_signal = Tensor::from_array((
            vec![batch, n_mels, frames],
            input.features().as_slice().to_vec().into_boxed_slice(),
        ))
        .map_err(|e| SttError::inference(format!("Failed to create audio tensor: {}", e)))?;

        let length = Tensor::from_array((vec![batch], vec![input.length()].into_boxed_slice()))
            .map_err(|e| SttError::inference(format!("Failed to create length tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![
                self.signal_input.as_str() => audio_signal,
                self.length_input.as_str() => length
            ])
            .map_err(|e| SttError::inference(format!("Encoder inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SttError::inference(format!("Failed to extract log-probs: {}", e)))?;

        if shape.len() != 3 || shape[0] != 1 {
            return Err(SttError::inference(format!(
                "Expected log-probs of shape [1, T, V], got {:?}",
                &shape[..]
            )));
        }
        let (out_frames, classes) = (shape[1] as usize, shape[2] as usize);
        let log_probs = Array2::from_shape_vec((out_frames, classes), data.to_vec())
            .map_err(|e| SttError::inference(format!("Failed to reshape log-probs: {}", e)))?;

        let output = if outputs.len() > 1 {
            let (_, lengths) = outputs[1]
                .try_extract_tensor::<i64>()
                .map_err(|e| {
                    SttError::inference(format!("Failed to extract encoded length: {}", e))
                })?;
            let encoded = lengths.first().copied().ok_or_else(|| {
                SttError::inference("Encoded length output is empty")
            })?;
            if encoded < 0 {
                return Err(SttError::inference(format!(
                    "Negative encoded length {}",
                    encoded
                )));
            }
            EngineOutput::new(log_probs, encoded as usize)?
        } else {
            EngineOutput::full(log_probs)
        };

        debug!(
            "Encoder output: {} frames x {} classes, encoded length {}",
            out_frames,
            classes,
            output.encoded_length()
        );
        Ok(output)
    }

    fn model_info(&self) -> String {
        format!(
            "OrtCtcModel: {} ({})",
            self.model_path.display(),
            if self.use_gpu { "CUDA" } else { "CPU" }
        )
    }
}

/// Pick the signal and length input names of a loaded graph
///
/// Known names win; a graph with exactly two unrecognized inputs is bound
/// in order (signal, then length).
fn resolve_input_names(names: &[&str]) -> Result<(String, String)> {
    let find = |aliases: &[&str]| {
        names
            .iter()
            .copied()
            .find(|name| aliases.contains(name))
            .map(str::to_string)
    };

    match (find(&SIGNAL_INPUTS[..]), find(&LENGTH_INPUTS[..])) {
        (Some(signal), Some(length)) => Ok((signal, length)),
        (None, None) if names.len() == 2 => {
            warn!(
                "Unrecognized input names {:?}; binding signal and length by position",
                names
            );
            Ok((names[0].to_string(), names[1].to_string()))
        }
        (signal, _) => Err(SttError::model_load(format!(
            "Model is missing the {} input (found {:?})",
            if signal.is_none() { "signal" } else { "length" },
            names
        ))),
    }
}
