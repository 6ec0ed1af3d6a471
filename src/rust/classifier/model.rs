use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use ndarray::{Array1, Array2, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A trained binary classifier: one probability per row of a feature matrix.
///
/// Implementations must be pure with respect to their inputs so that repeated
/// calls with the same features return the same scores.
pub trait ScoringModel: Send + Sync + std::fmt::Debug {
    /// Number of feature columns the model expects, if it declares one
    fn input_width(&self) -> Option<usize>;

    /// Scores every row of `features` (shape `[N, width]`), returning N values
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// A network exported to ONNX and executed through ONNX Runtime.
///
/// The model is expected to:
/// - Accept exactly one float input of shape [batch_size, width]
/// - Produce as first output one probability per row ([batch_size] or [batch_size, 1])
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    input_name: String,
    input_width: Option<usize>,
}

impl OnnxModel {
    pub fn from_file(path: impl AsRef<Path>, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        let session = create_session_builder(config)?.commit_from_file(path.as_ref())?;
        Self::validate_model(&session)?;

        let input = &session.inputs[0];
        let input_width = input
            .input_type
            .tensor_dimensions()
            .and_then(|dims| dims.last().copied())
            .and_then(|dim| usize::try_from(dim).ok());
        info!("ONNX model input '{}' (width: {:?})", input.name, input_width);

        Ok(Self {
            input_name: input.name.clone(),
            input_width,
            session,
        })
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.len() != 1 {
            return Err(ClassifierError::ModelError(format!(
                "Model must have exactly 1 input (the feature matrix), found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for scores".to_string(),
            ));
        }
        Ok(())
    }
}

impl ScoringModel for OnnxModel {
    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, ClassifierError> {
        let rows = features.nrows();
        let input_dyn = features.to_owned().into_dyn();
        let input = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let scores: Vec<f32> = output_tensor.iter().copied().collect();
        if scores.len() != rows {
            return Err(ClassifierError::PredictionError(format!(
                "Model produced {} values for {} inputs (output shape {:?})",
                scores.len(),
                rows,
                output_tensor.shape()
            )));
        }
        Ok(scores)
    }
}

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Linear => x,
        }
    }
}

/// Persisted dense layer: `weights` is `[inputs][outputs]`, as Keras stores kernels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

/// Persisted feed-forward network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetworkSpec {
    pub layers: Vec<DenseLayerSpec>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

/// A feed-forward network of fully connected layers evaluated with ndarray.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Builds the network, checking that layer widths chain and end in a single unit.
    pub fn from_spec(spec: DenseNetworkSpec) -> Result<Self, ClassifierError> {
        if spec.layers.is_empty() {
            return Err(ClassifierError::ModelError("Network must have at least one layer".into()));
        }

        let mut layers: Vec<DenseLayer> = Vec::with_capacity(spec.layers.len());
        for (index, layer) in spec.layers.into_iter().enumerate() {
            let inputs = layer.weights.len();
            let outputs = layer.weights.first().map(Vec::len).unwrap_or(0);
            if inputs == 0 || outputs == 0 {
                return Err(ClassifierError::ModelError(format!("Layer {} has empty weights", index)));
            }
            if layer.weights.iter().any(|row| row.len() != outputs) {
                return Err(ClassifierError::ModelError(format!("Layer {} has ragged weights", index)));
            }
            if layer.bias.len() != outputs {
                return Err(ClassifierError::ModelError(format!(
                    "Layer {} bias has {} values, expected {}",
                    index,
                    layer.bias.len(),
                    outputs
                )));
            }
            if let Some(previous) = layers.last() {
                if previous.weights.ncols() != inputs {
                    return Err(ClassifierError::ModelError(format!(
                        "Layer {} expects {} inputs but previous layer yields {}",
                        index,
                        inputs,
                        previous.weights.ncols()
                    )));
                }
            }

            let weights = Array2::from_shape_vec((inputs, outputs), layer.weights.concat())
                .map_err(|e| ClassifierError::ModelError(format!("Layer {}: {}", index, e)))?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
        }

        let last_width = layers.last().map(|l| l.weights.ncols()).unwrap_or(0);
        if last_width != 1 {
            return Err(ClassifierError::ModelError(format!(
                "Final layer must produce 1 score per input, produces {}",
                last_width
            )));
        }

        Ok(Self { layers })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to open {:?}: {}", path, e)))?;
        let spec: DenseNetworkSpec = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ClassifierError::ModelError(format!("Failed to parse {:?}: {}", path, e)))?;
        Self::from_spec(spec)
    }
}

impl ScoringModel for DenseNetwork {
    fn input_width(&self) -> Option<usize> {
        self.layers.first().map(|l| l.weights.nrows())
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, ClassifierError> {
        let expected = self.input_width().unwrap_or(0);
        if features.ncols() != expected {
            return Err(ClassifierError::PredictionError(format!(
                "Feature width {} does not match network input {}",
                features.ncols(),
                expected
            )));
        }

        let mut activations = features.to_owned();
        for layer in &self.layers {
            let mut z = activations.dot(&layer.weights) + &layer.bias;
            z.mapv_inplace(|x| layer.activation.apply(x));
            activations = z;
        }
        Ok(activations.column(0).to_vec())
    }
}
