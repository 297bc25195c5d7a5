//! # fedshap: Shapley-Valued Client Selection for Federated Learning
//!
//! fedshap simulates federated training rounds in which the server values
//! each participant's contribution with Shapley estimates and can use those
//! values to decide who participates next.
//!
//! ## Aggregation
//!
//! - [`fedavg()`] - Weighted parameter average (FedAvg / FedProx)
//! - [`GlobalModel`] - Shared model with all-or-nothing commits
//!
//! ## Valuation
//!
//! - [`exact_shapley`] - Powerset enumeration (up to [`MAX_EXACT_PLAYERS`])
//! - [`monte_carlo_shapley`] - Per-client subset sampling
//! - [`truncated_monte_carlo_shapley`] - Permutation sampling with truncation
//!
//! ## Selection
//!
//! - [`UniformRandom`] - FedAvg / FedProx baseline
//! - [`PowerOfChoice`] - Highest-loss clients from a decaying candidate pool
//! - [`SFedAvg`] - Softmax preferences with importance-weighted aggregation
//! - [`Ucb`] - Upper confidence bound over running Shapley values
//!
//! ## High-Level API
//!
//! Implement [`Trainer`] and [`Evaluator`] for your model and data, then
//! drive a [`Simulation`] built from a [`RunConfig`].

#![deny(missing_docs)]

pub mod aggregators;
pub mod config;
pub mod error;
pub mod history;
pub mod math;
pub mod model;
pub mod selection;
pub mod simulation;
pub mod traits;
pub mod valuation;

// Re-exports
pub use aggregators::{fedavg, GlobalModel};
pub use config::{Algorithm, AlgorithmOptions, RunConfig};
pub use error::FedShapError;
pub use history::{average_metrics, RoundMetrics, RoundRecord, RunHistory, ValuationDiagnostics};
pub use model::{Client, ClientUpdate, ModelState};
pub use selection::{
    PolicyPhase, PowerOfChoice, SFedAvg, SelectionPolicy, SelectionState, Ucb, UniformRandom,
};
pub use simulation::{RunSummary, Simulation};
pub use traits::{DataSplit, EvalMetrics, Evaluator, LocalTraining, Trainer};
pub use valuation::{
    exact_shapley, monte_carlo_shapley, truncated_monte_carlo_shapley, CoalitionGame,
    ShapleyEstimator, ShapleyMethod, Valuation, ValuationConfig, MAX_EXACT_PLAYERS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
