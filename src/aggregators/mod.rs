//! Server-side aggregation of client model updates.
//!
//! | Item | Mutates global state | Used by |
//! |------|---------------------|---------|
//! | [`fedavg`] | No | value estimators, round orchestrator, [`GlobalModel::commit`] |
//! | [`fedavg_population`] | No | round orchestrator, importance-weighted policies |
//! | [`GlobalModel::install`] | Yes | round orchestrator, once per round |

pub mod fedavg;

pub use fedavg::{fedavg, fedavg_population, normalize_weights, scale_weights};

use crate::error::FedShapError;
use crate::model::ModelState;

/// Authoritative server model.
///
/// Between rounds this is the only source of truth for the global
/// parameters. It is replaced only by [`GlobalModel::commit`] or
/// [`GlobalModel::install`].
///
/// # Example
///
/// ```rust
/// use fedshap::{GlobalModel, ModelState};
/// use ndarray::array;
///
/// let mut global = GlobalModel::new(ModelState::from(array![[0.0, 0.0]]));
///
/// let a = ModelState::from(array![[1.0, 2.0]]);
/// let b = ModelState::from(array![[3.0, 4.0]]);
///
/// global.commit(&[&a, &b], &[1.0, 3.0]).unwrap();
/// assert!((global.state().layers()[0][[0, 0]] - 2.5).abs() < 1e-6);
/// assert_eq!(global.commits(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct GlobalModel {
    state: ModelState,
    commits: usize,
}

impl GlobalModel {
    /// Start from an initial parameter state.
    pub fn new(initial: ModelState) -> Self {
        Self {
            state: initial,
            commits: 0,
        }
    }

    /// Current parameters.
    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Aggregate `updates` with `weights` and make the result the new global model.
    ///
    /// On error the current state is left unchanged.
    pub fn commit(
        &mut self,
        updates: &[&ModelState],
        weights: &[f32],
    ) -> Result<&ModelState, FedShapError> {
        let next = fedavg(updates, weights)?;
        self.install(next)
    }

    /// Make an already aggregated state the new global model.
    ///
    /// The shape must match the current one; on error nothing changes.
    pub fn install(&mut self, next: ModelState) -> Result<&ModelState, FedShapError> {
        if !next.same_shape(&self.state) {
            return Err(FedShapError::DimensionMismatch);
        }
        self.state = next;
        self.commits += 1;
        Ok(&self.state)
    }

    /// Replace the state wholesale (e.g. to rewind to a snapshot).
    pub fn restore(&mut self, state: ModelState) {
        self.state = state;
    }

    /// Consume the wrapper and return the parameters.
    pub fn into_state(self) -> ModelState {
        self.state
    }
}
