//! Cooperative games over client coalitions.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::aggregators::fedavg;
use crate::error::FedShapError;
use crate::model::ModelState;
use crate::traits::{DataSplit, Evaluator};

/// A characteristic function `v(S)` over players `0..players()`.
///
/// Estimators always pass `members` sorted ascending and without duplicates.
pub trait CoalitionGame: Sync {
    /// Number of players.
    fn players(&self) -> usize;

    /// Utility of the coalition made of `members`.
    fn value(&self, members: &[usize]) -> Result<f64, FedShapError>;
}

/// Game whose utility is the negated validation loss of a hypothetical aggregate.
///
/// Player `j` is the `j`-th update of the round. The empty coalition is
/// scored with the current global model, so a player's value is its
/// contribution to reducing validation loss relative to not aggregating.
/// Evaluations only ever touch private copies; the global model is borrowed
/// immutably.
pub struct AggregateGame<'a> {
    baseline: &'a ModelState,
    updates: Vec<&'a ModelState>,
    weights: Vec<f32>,
    evaluator: &'a dyn Evaluator,
}

impl<'a> AggregateGame<'a> {
    /// Build the game for one round.
    pub fn new(
        baseline: &'a ModelState,
        updates: Vec<&'a ModelState>,
        weights: Vec<f32>,
        evaluator: &'a dyn Evaluator,
    ) -> Result<Self, FedShapError> {
        if updates.len() != weights.len() {
            return Err(FedShapError::DimensionMismatch);
        }
        Ok(Self {
            baseline,
            updates,
            weights,
            evaluator,
        })
    }
}

impl CoalitionGame for AggregateGame<'_> {
    fn players(&self) -> usize {
        self.updates.len()
    }

    fn value(&self, members: &[usize]) -> Result<f64, FedShapError> {
        let loss = if members.is_empty() {
            self.evaluator
                .evaluate(self.baseline, DataSplit::Validation)?
                .loss
        } else {
            let mut models = Vec::with_capacity(members.len());
            let mut weights = Vec::with_capacity(members.len());
            for &m in members {
                let model = self
                    .updates
                    .get(m)
                    .ok_or(FedShapError::UnknownClient(m))?;
                models.push(*model);
                weights.push(self.weights[m]);
            }
            let candidate = fedavg(&models, &weights)?;
            self.evaluator
                .evaluate(&candidate, DataSplit::Validation)?
                .loss
        };
        if !loss.is_finite() {
            return Err(FedShapError::NonFiniteUtility(loss));
        }
        Ok(-loss)
    }
}

/// Wrapper that counts utility evaluations across threads.
pub struct CountingGame<'g, G: CoalitionGame + ?Sized> {
    inner: &'g G,
    evaluations: AtomicUsize,
}

impl<'g, G: CoalitionGame + ?Sized> CountingGame<'g, G> {
    /// Wrap `inner` with a zeroed counter.
    pub fn new(inner: &'g G) -> Self {
        Self {
            inner,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl<G: CoalitionGame + ?Sized> CoalitionGame for CountingGame<'_, G> {
    fn players(&self) -> usize {
        self.inner.players()
    }

    fn value(&self, members: &[usize]) -> Result<f64, FedShapError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.value(members)
    }
}
