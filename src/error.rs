//! Error types for fedshap

use thiserror::Error;

/// All possible errors in fedshap
#[derive(Error, Debug)]
pub enum FedShapError {
    /// No updates were provided for aggregation
    #[error("Empty updates provided")]
    EmptyUpdates,

    /// Updates (or their weights) have inconsistent dimensions
    #[error("Dimension mismatch in updates")]
    DimensionMismatch,

    /// A single aggregation weight is negative or not finite
    #[error("Invalid aggregation weight: {0}")]
    InvalidWeight(f32),

    /// Aggregation weights cannot be normalized
    #[error("Invalid aggregation weight sum: {0} (must be positive and finite)")]
    InvalidWeightSum(f32),

    /// Algorithm name is not recognized
    #[error("Unknown algorithm '{0}'. Use 'fedavg', 'fedprox', 'sfedavg', 'poc', or 'ucb'")]
    UnknownAlgorithm(String),

    /// A hyperparameter required by the chosen algorithm is missing
    #[error("Algorithm '{algorithm}' requires option '{option}'")]
    MissingOption {
        /// Algorithm name
        algorithm: &'static str,
        /// Name of the missing option
        option: &'static str,
    },

    /// Configuration value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Exact enumeration requested for too many players
    #[error("Exact Shapley valuation supports at most {max} players, got {actual}")]
    TooManyPlayers {
        /// Maximum supported coalition size
        max: usize,
        /// Players in the game
        actual: usize,
    },

    /// Client index is not part of the population
    #[error("Unknown client index {0}")]
    UnknownClient(usize),

    /// A selection policy returned an unusable participant set
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A policy that learns from client values was updated without them
    #[error("Policy '{0}' requires per-client value estimates")]
    MissingValuation(&'static str),

    /// Local training failed for a client
    #[error("Local training failed for client {client}: {reason}")]
    Training {
        /// Client index
        client: usize,
        /// Failure description from the trainer
        reason: String,
    },

    /// Model evaluation failed
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// A coalition utility came back as NaN or infinite
    #[error("Non-finite coalition utility: {0}")]
    NonFiniteUtility(f64),

    /// All configured rounds have already been executed
    #[error("Run already finished after {0} rounds")]
    RunFinished(usize),

    /// Array shape mismatch
    #[error("Array shape error: {0}")]
    ShapeError(String),

    /// Configuration or record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ndarray::ShapeError> for FedShapError {
    fn from(e: ndarray::ShapeError) -> Self {
        FedShapError::ShapeError(e.to_string())
    }
}
