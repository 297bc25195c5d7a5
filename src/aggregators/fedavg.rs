//! FedAvg weighted aggregation
//!
//! Standard federated averaging as described by McMahan et al. (2017):
//! the new model is the weight-normalized elementwise sum of the client
//! models. These functions are pure; one is called once per round to build
//! the next global model and [`fedavg`] many times per round by the value
//! estimators to score hypothetical coalitions.
//!
//! [`fedavg_population`] divides by a fixed population weight instead of the
//! sample's own weight sum, which keeps importance-weighted aggregates
//! unbiased.

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::FedShapError;
use crate::model::ModelState;

fn check_weights(weights: &[f32]) -> Result<(), FedShapError> {
    if weights.is_empty() {
        return Err(FedShapError::EmptyUpdates);
    }
    if let Some(&bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(FedShapError::InvalidWeight(bad));
    }
    Ok(())
}

/// Normalize raw aggregation weights so they sum to 1.
///
/// Rejects negative or non-finite weights and a zero (or non-finite) total
/// instead of letting the division produce NaN.
pub fn normalize_weights(weights: &[f32]) -> Result<Vec<f32>, FedShapError> {
    check_weights(weights)?;
    let weight_sum: f32 = weights.iter().sum();
    if weight_sum <= 0.0 || !weight_sum.is_finite() {
        return Err(FedShapError::InvalidWeightSum(weight_sum));
    }
    Ok(weights.iter().map(|w| w / weight_sum).collect())
}

/// Divide raw weights by a fixed `total` instead of their own sum.
///
/// The coefficients need not sum to 1. With `total` set to the whole
/// population's weight and `weights[i] = size_i / pi_i` this is the
/// Horvitz-Thompson coefficient set.
pub fn scale_weights(weights: &[f32], total: f32) -> Result<Vec<f32>, FedShapError> {
    check_weights(weights)?;
    if total <= 0.0 || !total.is_finite() {
        return Err(FedShapError::InvalidWeightSum(total));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Elementwise `sum_i coefficients[i] * updates[i]`, layer by layer in parallel.
fn combine(updates: &[&ModelState], coefficients: &[f32]) -> Result<ModelState, FedShapError> {
    if updates.is_empty() {
        return Err(FedShapError::EmptyUpdates);
    }
    if coefficients.len() != updates.len() {
        return Err(FedShapError::DimensionMismatch);
    }

    let reference = updates[0];
    for update in &updates[1..] {
        if !update.same_shape(reference) {
            return Err(FedShapError::DimensionMismatch);
        }
    }

    let layers: Vec<Array2<f32>> = (0..reference.layers().len())
        .into_par_iter()
        .map(|layer_idx| {
            let dim = reference.layers()[layer_idx].dim();
            updates.iter().zip(coefficients.iter()).fold(
                Array2::<f32>::zeros(dim),
                |mut acc, (update, &weight)| {
                    acc.scaled_add(weight, &update.layers()[layer_idx]);
                    acc
                },
            )
        })
        .collect();

    Ok(ModelState::new(layers))
}

/// Weighted FedAvg over a set of client models.
///
/// # Arguments
///
/// * `updates` - Client models; all must share the same layer shapes
/// * `weights` - Raw weights (e.g. partition sizes), one per update
///
/// The inputs are never mutated. Layers are combined in parallel.
pub fn fedavg(updates: &[&ModelState], weights: &[f32]) -> Result<ModelState, FedShapError> {
    if updates.is_empty() {
        return Err(FedShapError::EmptyUpdates);
    }
    if weights.len() != updates.len() {
        return Err(FedShapError::DimensionMismatch);
    }
    combine(updates, &normalize_weights(weights)?)
}

/// FedAvg normalized by the population weight `total` rather than the sample's.
///
/// For a sample drawn with inclusion probabilities `pi` and weights
/// `size_i / pi_i`, the expected result equals the FedAvg of every client.
pub fn fedavg_population(
    updates: &[&ModelState],
    weights: &[f32],
    total: f32,
) -> Result<ModelState, FedShapError> {
    if updates.is_empty() {
        return Err(FedShapError::EmptyUpdates);
    }
    if weights.len() != updates.len() {
        return Err(FedShapError::DimensionMismatch);
    }
    combine(updates, &scale_weights(weights, total)?)
}
