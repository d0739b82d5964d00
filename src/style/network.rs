use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::types::StyleNetwork;
use crate::error::{Error, Result};
use crate::prompt::Extent;
use crate::segmentation::extract;

/// Single-input, single-output ONNX generator.
pub struct OnnxStyleNetwork {
    // ort needs exclusive access to run; the weights themselves never change.
    session: Mutex<Session>,
    working_size: Extent,
}

impl OnnxStyleNetwork {
    /// Load a generator exported with one `[1, 3, H, W]` input and output.
    ///
    /// `name` labels errors; any failure is reported as
    /// [`Error::BackendUnavailable`].
    pub fn load<P: AsRef<Path>>(name: &str, model_path: P, working_size: Extent) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(Error::unavailable(
                name,
                format!("weights not found at {}", path.display()),
            ));
        }

        tracing::info!("Loading style network {} from {}", name, path.display());

        let session = Session::builder()
            .map_err(|e| Error::unavailable(name, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::unavailable(name, e))?
            .commit_from_file(path)
            .map_err(|e| Error::unavailable(name, e))?;

        if session.inputs.len() != 1 || session.outputs.is_empty() {
            return Err(Error::unavailable(
                name,
                format!(
                    "expected one input and at least one output, found {} and {}",
                    session.inputs.len(),
                    session.outputs.len()
                ),
            ));
        }

        Ok(Self {
            session: Mutex::new(session),
            working_size,
        })
    }
}

impl StyleNetwork for OnnxStyleNetwork {
    fn working_size(&self) -> Extent {
        self.working_size
    }

    fn run(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("inference").entered();

        let input = Tensor::from_array(input).map_err(|e| Error::inference("generator", e))?;

        // Run inference
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| Error::inference("generator", e))?;

        // Back to a single NCHW batch
        let output = extract("generator", &outputs[0])?;
        output
            .into_dimensionality()
            .map_err(|e| Error::inference("generator", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_weights_are_reported_as_unavailable() {
        let err = OnnxStyleNetwork::load("hayao", "/nonexistent/hayao.onnx", Extent::new(256, 256))
            .err()
            .unwrap();
        match err {
            Error::BackendUnavailable { name, .. } => assert_eq!(name, "hayao"),
            other => panic!("unexpected error {other}"),
        }
    }
}
