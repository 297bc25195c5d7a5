//! Interfaces to the collaborators that own data and models.
//!
//! Local training and evaluation are supplied by the caller. Both traits
//! require `Sync` because the orchestrator fans calls out across rayon's
//! thread pool within a round.

use serde::{Deserialize, Serialize};

use crate::error::FedShapError;
use crate::model::{Client, ModelState};

/// Hyperparameters for one client's local training step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalTraining {
    /// Local epochs (`E`)
    pub epochs: usize,
    /// Local batches per epoch (`B`)
    pub batches: usize,
    /// Optimizer learning rate
    pub learning_rate: f32,
    /// Optimizer momentum
    pub momentum: f32,
    /// FedProx proximal coefficient; `None` for plain local SGD
    pub proximal_mu: Option<f32>,
}

/// Which evaluation set to measure a model on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSplit {
    /// Union of the clients' training partitions
    Train,
    /// Held-out server data used for valuation
    Validation,
    /// Held-out server data used for reporting
    Test,
}

/// Loss and accuracy of a model on one split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Mean loss
    pub loss: f64,
    /// Accuracy in `[0, 1]`
    pub accuracy: f64,
}

/// Runs local training on a client's private partition.
pub trait Trainer: Sync {
    /// Train starting from `global` and return the client's new parameters.
    ///
    /// Must not mutate `global`.
    fn train(
        &self,
        global: &ModelState,
        client: &Client,
        params: &LocalTraining,
    ) -> Result<ModelState, FedShapError>;
}

/// Measures model quality.
pub trait Evaluator: Sync {
    /// Evaluate `model` on a server-side or pooled split.
    fn evaluate(&self, model: &ModelState, split: DataSplit) -> Result<EvalMetrics, FedShapError>;

    /// Loss of `model` on one client's local partition.
    fn client_loss(&self, model: &ModelState, client: &Client) -> Result<f64, FedShapError>;
}
