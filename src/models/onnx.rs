//! ONNX Runtime backed estimator

use crate::error::{AdvisorError, AdvisorResult};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Estimator wrapping an ONNX Runtime session.
///
/// Classifier exports expose a `label` output and a `probabilities` output
/// (either a `[batch, classes]` tensor or a `seq(map(int64, float))`);
/// regressor exports expose a single value tensor.
pub struct OnnxEstimator {
    /// Session behind a mutex because `Session::run` needs `&mut`
    session: Mutex<Session>,
    input_name: String,
    value_output: String,
    label_output: Option<String>,
    probability_output: Option<String>,
    feature_names: Option<Vec<String>>,
}

impl fmt::Debug for OnnxEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxEstimator")
            .field("input_name", &self.input_name)
            .field("value_output", &self.value_output)
            .field("label_output", &self.label_output)
            .field("probability_output", &self.probability_output)
            .field("feature_names", &self.feature_names)
            .finish()
    }
}

fn onnx_error(e: impl fmt::Display) -> AdvisorError {
    AdvisorError::prediction(format!("onnx runtime: {}", e))
}

impl OnnxEstimator {
    /// Build a session from an `.onnx` file.
    ///
    /// Declared feature names are read from a `<stem>.features.json` sidecar
    /// (a JSON array of column names) when one exists next to the model.
    pub fn load(path: &Path, threads: usize) -> Result<Self> {
        ort::init().commit()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let label_output = output_names.iter().find(|n| n.contains("label")).cloned();
        let probability_output = output_names.iter().find(|n| n.contains("prob")).cloned();
        let value_output = output_names
            .iter()
            .find(|n| !n.contains("label"))
            .or_else(|| output_names.first())
            .cloned()
            .unwrap_or_else(|| "variable".to_string());

        let sidecar = path.with_extension("features.json");
        let feature_names = if sidecar.exists() {
            let raw = std::fs::read_to_string(&sidecar)
                .with_context(|| format!("Failed to read {}", sidecar.display()))?;
            let names: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", sidecar.display()))?;
            Some(names)
        } else {
            None
        };

        info!(
            path = %path.display(),
            input = %input_name,
            outputs = ?output_names,
            declared_features = feature_names.as_ref().map(Vec::len).unwrap_or(0),
            threads = threads,
            "ONNX session ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            value_output,
            label_output,
            probability_output,
            feature_names,
        })
    }

    pub fn has_probabilities(&self) -> bool {
        self.probability_output.is_some()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn input_tensor(rows: &[Vec<f64>]) -> AdvisorResult<Tensor<f32>> {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let shape = vec![rows.len() as i64, n_features as i64];
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        Tensor::from_array((shape, data)).map_err(onnx_error)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let input_tensor = Self::input_tensor(rows)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| AdvisorError::prediction(format!("Lock error: {}", e)))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(onnx_error)?;

        // Classifiers: prefer the explicit label output
        if let Some(label_name) = &self.label_output {
            if let Some(output) = outputs.get(label_name.as_str()) {
                if let Ok((_, labels)) = output.try_extract_tensor::<i64>() {
                    return Ok(labels.iter().map(|&l| l as f64).collect());
                }
            }
        }

        let output = outputs
            .get(self.value_output.as_str())
            .ok_or_else(|| onnx_error(format!("output '{}' missing", self.value_output)))?;
        let (_, values) = output.try_extract_tensor::<f32>().map_err(onnx_error)?;
        Ok(values.iter().map(|&v| v as f64).collect())
    }

    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<Vec<f64>>> {
        let output_name = self
            .probability_output
            .as_deref()
            .ok_or_else(|| onnx_error("model has no probability output"))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let input_tensor = Self::input_tensor(rows)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| AdvisorError::prediction(format!("Lock error: {}", e)))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(onnx_error)?;
        let output = outputs
            .get(output_name)
            .ok_or_else(|| onnx_error(format!("output '{}' missing", output_name)))?;

        // Tensor format: [batch, num_classes]
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let num_classes = if dims.len() == 2 { dims[1].max(1) as usize } else { 1 };
            debug!(num_classes = num_classes, "Extracted probabilities from tensor");
            return Ok(data
                .chunks(num_classes)
                .map(|chunk| chunk.iter().map(|&p| p as f64).collect())
                .collect());
        }

        // Sequence format: seq(map(int64, float)), one map per row
        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return probabilities_from_sequence(output).map_err(|e| onnx_error(format!("{:#}", e)));
        }

        Err(onnx_error(format!(
            "unsupported probability output type for '{}'",
            output_name
        )))
    }
}

fn probabilities_from_sequence(output: &ort::value::DynValue) -> Result<Vec<Vec<f64>>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    maps.iter()
        .map(|map_value| {
            let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            let num_classes = kv_pairs
                .iter()
                .map(|(class_id, _)| *class_id + 1)
                .max()
                .unwrap_or(0)
                .max(0) as usize;
            let mut proba = vec![0.0; num_classes];
            for (class_id, prob) in kv_pairs {
                if class_id >= 0 {
                    proba[class_id as usize] = prob as f64;
                }
            }
            Ok(proba)
        })
        .collect()
}
