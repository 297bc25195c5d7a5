//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use fedshap::{
    Client, DataSplit, EvalMetrics, Evaluator, FedShapError, LocalTraining, ModelState, Trainer,
};
use ndarray::Array2;

/// Each client pulls the parameters toward its own target point; quality is
/// measured as squared distance to a shared optimum.
pub struct Quadratic {
    pub targets: Vec<Vec<f32>>,
    pub optimum: Vec<f32>,
    pub rate: f32,
}

impl Quadratic {
    /// `n` clients whose targets spread around `optimum`; client `i` is offset by `i * spread`.
    pub fn new(n: usize, optimum: Vec<f32>, spread: f32) -> Self {
        let targets = (0..n)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                optimum
                    .iter()
                    .map(|&o| o + sign * spread * i as f32)
                    .collect()
            })
            .collect();
        Self {
            targets,
            optimum,
            rate: 0.5,
        }
    }

    pub fn initial(&self) -> ModelState {
        ModelState::from(Array2::zeros((1, self.optimum.len())))
    }

    fn distance_sq(model: &ModelState, point: &[f32]) -> f64 {
        model.layers()[0]
            .iter()
            .zip(point.iter())
            .map(|(&x, &p)| ((x - p) as f64).powi(2))
            .sum()
    }
}

impl Trainer for Quadratic {
    fn train(
        &self,
        global: &ModelState,
        client: &Client,
        params: &LocalTraining,
    ) -> Result<ModelState, FedShapError> {
        let target = &self.targets[client.id];
        let steps = (params.epochs * params.batches).max(1) as i32;
        let keep = (1.0 - self.rate).powi(steps.min(4));
        let mut layer = global.layers()[0].clone();
        for (x, &t) in layer.iter_mut().zip(target.iter()) {
            *x = t + keep * (*x - t);
        }
        Ok(ModelState::from(layer))
    }
}

impl Evaluator for Quadratic {
    fn evaluate(&self, model: &ModelState, split: DataSplit) -> Result<EvalMetrics, FedShapError> {
        let shift = match split {
            DataSplit::Train => 0.0,
            DataSplit::Validation => 0.01,
            DataSplit::Test => 0.02,
        };
        let loss = Self::distance_sq(model, &self.optimum) + shift;
        Ok(EvalMetrics {
            loss,
            accuracy: (-loss).exp(),
        })
    }

    fn client_loss(&self, model: &ModelState, client: &Client) -> Result<f64, FedShapError> {
        Ok(Self::distance_sq(model, &self.targets[client.id]))
    }
}

/// Trainer that fails for one client.
pub struct FailsFor(pub usize);

impl Trainer for FailsFor {
    fn train(
        &self,
        global: &ModelState,
        client: &Client,
        _params: &LocalTraining,
    ) -> Result<ModelState, FedShapError> {
        if client.id == self.0 {
            return Err(FedShapError::Training {
                client: client.id,
                reason: "out of memory".into(),
            });
        }
        Ok(global.clone())
    }
}

/// Evaluator that delegates to `inner` except on one split, where it fails.
pub struct FailsOn<'a> {
    pub inner: &'a Quadratic,
    pub split: DataSplit,
}

impl Evaluator for FailsOn<'_> {
    fn evaluate(&self, model: &ModelState, split: DataSplit) -> Result<EvalMetrics, FedShapError> {
        if split == self.split {
            return Err(FedShapError::Evaluation("boom".into()));
        }
        self.inner.evaluate(model, split)
    }

    fn client_loss(&self, model: &ModelState, client: &Client) -> Result<f64, FedShapError> {
        self.inner.client_loss(model, client)
    }
}

/// Population of `n` clients with partition sizes `10, 11, 12, ...`.
pub fn population(n: usize) -> Vec<Client> {
    (0..n).map(|i| Client::new(i, 10.0 + i as f32)).collect()
}
