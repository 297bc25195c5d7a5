//! Clients, model parameter state, and client updates.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::FedShapError;

/// Opaque handle to a client's private data partition.
///
/// The partition itself lives with the [`Trainer`](crate::Trainer) and
/// [`Evaluator`](crate::Evaluator); the server only sees its identity and size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Index of the client in the population (`0..num_clients`)
    pub id: usize,
    /// Partition size, used for unbiased weighted averaging
    pub weight: f32,
}

impl Client {
    /// Create a client handle.
    pub fn new(id: usize, weight: f32) -> Self {
        Self { id, weight }
    }
}

/// Model parameters as an ordered list of 2-D tensors (one per layer).
#[derive(Clone, Debug, PartialEq)]
pub struct ModelState {
    layers: Vec<Array2<f32>>,
}

impl ModelState {
    /// Wrap a list of parameter tensors.
    pub fn new(layers: Vec<Array2<f32>>) -> Self {
        Self { layers }
    }

    /// All-zero state with the same tensor shapes as `self`.
    pub fn zeros_like(&self) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .map(|layer| Array2::zeros(layer.dim()))
                .collect(),
        }
    }

    /// Parameter tensors in layer order.
    pub fn layers(&self) -> &[Array2<f32>] {
        &self.layers
    }

    /// Consume the state and return its tensors.
    pub fn into_layers(self) -> Vec<Array2<f32>> {
        self.layers
    }

    /// Total number of scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|layer| layer.len()).sum()
    }

    /// Whether `other` has identical layer count and tensor shapes.
    pub fn same_shape(&self, other: &ModelState) -> bool {
        self.layers.len() == other.layers.len()
            && self
                .layers
                .iter()
                .zip(other.layers.iter())
                .all(|(a, b)| a.dim() == b.dim())
    }

    /// Flatten all parameters into a single vector (layer order, row-major).
    pub fn flatten(&self) -> Vec<f32> {
        self.layers
            .iter()
            .flat_map(|layer| layer.iter().copied())
            .collect()
    }

    /// Build a state from a flattened parameter vector and the shapes of `template`.
    pub fn from_flat(template: &ModelState, values: &[f32]) -> Result<Self, FedShapError> {
        if values.len() != template.num_parameters() {
            return Err(FedShapError::DimensionMismatch);
        }
        let mut offset = 0;
        let mut layers = Vec::with_capacity(template.layers.len());
        for layer in &template.layers {
            let len = layer.len();
            layers.push(Array2::from_shape_vec(
                layer.dim(),
                values[offset..offset + len].to_vec(),
            )?);
            offset += len;
        }
        Ok(Self { layers })
    }
}

impl From<Array2<f32>> for ModelState {
    fn from(layer: Array2<f32>) -> Self {
        Self::new(vec![layer])
    }
}

/// Result of one client's local training in one round.
#[derive(Clone, Debug)]
pub struct ClientUpdate {
    /// Index of the client that produced the update
    pub client: usize,
    /// Raw aggregation weight used for this update
    pub weight: f32,
    /// Locally trained parameters
    pub model: ModelState,
}
