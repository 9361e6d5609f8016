//! Model execution
//!
//! The trainer and the control loop both run a pre-built artifact; neither
//! computes gradients. [`OnnxInterpreter`] executes artifacts with ONNX
//! Runtime.

use crate::domain::errors::{GloveError, GloveResult};
use ort::session::Session;
use std::path::Path;
use tracing::info;

/// Every artifact produces two output columns per input row.
pub const OUTPUT_COLUMNS: usize = 2;

pub trait Interpreter {
    /// Run a `rows` x `cols` row-major input, returning one output pair per
    /// row.
    fn run(&mut self, input: &[f32], rows: usize, cols: usize) -> GloveResult<Vec<[f32; 2]>>;
}

/// Split a flat output tensor into per-row pairs.
pub fn split_output(data: &[f32], rows: usize) -> GloveResult<Vec<[f32; 2]>> {
    if data.len() != rows * OUTPUT_COLUMNS {
        return Err(GloveError::Inference(format!(
            "expected {} output values for {} rows, got {}",
            rows * OUTPUT_COLUMNS,
            rows,
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(OUTPUT_COLUMNS)
        .map(|pair| [pair[0], pair[1]])
        .collect())
}

pub struct OnnxInterpreter {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxInterpreter {
    /// Load an artifact file. A missing file is
    /// [`GloveError::ArtifactMissing`].
    pub fn load(path: &Path) -> GloveResult<Self> {
        if !path.is_file() {
            return Err(GloveError::artifact_missing(path));
        }

        let session = Session::builder()?.commit_from_file(path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| GloveError::Inference("model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| GloveError::Inference("model has no outputs".to_string()))?;

        info!(
            "Loaded model {} (input '{}', output '{}')",
            path.display(),
            input_name,
            output_name
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl Interpreter for OnnxInterpreter {
    fn run(&mut self, input: &[f32], rows: usize, cols: usize) -> GloveResult<Vec<[f32; 2]>> {
        if input.len() != rows * cols {
            return Err(GloveError::Inference(format!(
                "input has {} values, expected {}x{}",
                input.len(),
                rows,
                cols
            )));
        }

        let input_value = ort::value::Value::from_array((vec![rows, cols], input.to_vec()))?;
        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        split_output(data, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_output_pairs_rows() {
        let pairs = split_output(&[0.1, 0.2, 0.3, 0.4], 2).unwrap();
        assert_eq!(pairs, vec![[0.1, 0.2], [0.3, 0.4]]);
    }

    #[test]
    fn test_split_output_rejects_wrong_shape() {
        assert!(split_output(&[0.1, 0.2, 0.3], 2).is_err());
        assert!(split_output(&[0.1, 0.2], 2).is_err());
    }

    #[test]
    fn test_missing_artifact_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.onnx");
        match OnnxInterpreter::load(&path) {
            Err(GloveError::ArtifactMissing(p)) => assert_eq!(p, path.display().to_string()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loaded a missing artifact"),
        }
    }
}
