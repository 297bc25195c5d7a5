//! Round orchestration: select, train, value, aggregate, evaluate, update.
//!
//! A [`Simulation`] owns all mutable run state (global model, policy,
//! random generator, history). The initial model, client list, and
//! collaborators are borrowed immutably, so repeated runs start from the
//! same snapshot.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregators::{fedavg, fedavg_population, GlobalModel};
use crate::config::RunConfig;
use crate::error::FedShapError;
use crate::history::{RoundMetrics, RoundRecord, RunHistory, ValuationDiagnostics};
use crate::math::cosine_distance;
use crate::model::{Client, ClientUpdate, ModelState};
use crate::selection::{build_policy, num_selected, SelectionContext, SelectionPolicy, SelectionState};
use crate::traits::{DataSplit, Evaluator, Trainer};
use crate::valuation::{
    exact_shapley, AggregateGame, CoalitionGame, ShapleyEstimator, ShapleyMethod, Valuation,
    MAX_EXACT_PLAYERS,
};

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Every round's record
    pub history: RunHistory,
    /// Participations per client
    pub selection_counts: Vec<usize>,
    /// Sum of per-round value estimates per client
    pub cumulative_values: Vec<f64>,
    /// Learned policy statistics, for value-driven policies
    pub final_state: Option<SelectionState>,
    /// Global model after the last round
    pub final_model: ModelState,
}

/// One federated run over a fixed client population.
pub struct Simulation<'a> {
    config: RunConfig,
    clients: &'a [Client],
    initial: ModelState,
    trainer: &'a dyn Trainer,
    evaluator: &'a dyn Evaluator,
    num_selected: usize,
    estimator: ShapleyEstimator,
    global: GlobalModel,
    policy: Box<dyn SelectionPolicy>,
    rng: StdRng,
    history: RunHistory,
    round: usize,
}

impl<'a> Simulation<'a> {
    /// Validate everything up front and prepare round 0.
    ///
    /// Configuration and population errors surface here, before any
    /// collaborator is called.
    pub fn new(
        config: RunConfig,
        clients: &'a [Client],
        initial: &ModelState,
        trainer: &'a dyn Trainer,
        evaluator: &'a dyn Evaluator,
    ) -> Result<Self, FedShapError> {
        config.validate()?;
        validate_clients(clients)?;
        if initial.layers().is_empty() {
            return Err(FedShapError::InvalidConfig(
                "initial model has no layers".into(),
            ));
        }

        let k = num_selected(config.select_fraction, clients.len())?;
        let policy = build_policy(&config.algorithm, clients.len(), k);
        debug!(
            algorithm = config.algorithm.name(),
            policy = policy.name(),
            clients = clients.len(),
            per_round = k,
            seed = config.seed,
            "simulation ready"
        );

        Ok(Self {
            estimator: ShapleyEstimator::new(config.valuation),
            rng: StdRng::seed_from_u64(config.seed),
            global: GlobalModel::new(initial.clone()),
            initial: initial.clone(),
            num_selected: k,
            policy,
            config,
            clients,
            trainer,
            evaluator,
            history: RunHistory::new(),
            round: 0,
        })
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Clients selected per round.
    pub fn num_selected(&self) -> usize {
        self.num_selected
    }

    /// Next round to run.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Current global model.
    pub fn global(&self) -> &ModelState {
        self.global.state()
    }

    /// Name of the active selection policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Learned statistics of the active policy, if it keeps any.
    pub fn policy_state(&self) -> Option<&SelectionState> {
        self.policy.state()
    }

    /// Rounds recorded so far.
    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Whether all configured rounds have run.
    pub fn is_finished(&self) -> bool {
        self.round >= self.config.rounds
    }

    /// Execute one round.
    ///
    /// The next global model is aggregated and evaluated before anything is
    /// committed. Any failure aborts the round and leaves the global model,
    /// the policy statistics, the history, and the round counter as they
    /// were.
    pub fn step(&mut self) -> Result<&RoundRecord, FedShapError> {
        if self.is_finished() {
            return Err(FedShapError::RunFinished(self.round));
        }
        let round = self.round;
        let n = self.clients.len();
        let phase = self.policy.phase();

        let ctx = SelectionContext::new(self.clients, self.global.state(), self.evaluator);
        let participants = self.policy.select(round, &ctx, &mut self.rng)?;
        let selected = validate_selection(&participants, n)?;

        let params = self.config.local_training();
        let global = self.global.state();
        let (trainer, clients) = (self.trainer, self.clients);
        let raw_weights = self.policy.aggregation_weights(&participants, clients);
        let updates: Vec<ClientUpdate> = participants
            .par_iter()
            .zip(raw_weights.par_iter())
            .map(|(&client, &weight)| -> Result<ClientUpdate, FedShapError> {
                let model = trainer.train(global, &clients[client], &params)?;
                Ok(ClientUpdate {
                    client,
                    weight,
                    model,
                })
            })
            .collect::<Result<_, _>>()?;
        if updates.iter().any(|u| !u.model.same_shape(global)) {
            return Err(FedShapError::DimensionMismatch);
        }

        let weights: Vec<f32> = updates.iter().map(|u| u.weight).collect();
        let update_refs: Vec<&ModelState> = updates.iter().map(|u| &u.model).collect();

        let mut valuation = None;
        let mut diagnostics = Vec::new();
        if self.policy.requires_valuation() || self.config.valuation.every_round {
            let game = AggregateGame::new(global, update_refs.clone(), weights.clone(), self.evaluator)?;
            let estimate = self.estimator.estimate(&game, &mut self.rng)?;
            debug!(
                round,
                method = self.estimator.config().method.name(),
                evaluations = estimate.evaluations,
                samples = estimate.samples,
                converged = estimate.converged,
                "valuation done"
            );
            if self.config.valuation.compare_estimators && participants.len() <= MAX_EXACT_PLAYERS {
                diagnostics = compare_estimators(&self.estimator, &game, &mut self.rng)?;
            }
            valuation = Some(estimate);
        }

        let next = match self.policy.aggregation_total(clients) {
            Some(total) => fedavg_population(&update_refs, &weights, total)?,
            None => fedavg(&update_refs, &weights)?,
        };
        if !next.same_shape(global) {
            return Err(FedShapError::DimensionMismatch);
        }
        let metrics = self.evaluate(&next)?;

        let round_values = valuation.as_ref().map(|v| v.values.as_slice());
        self.policy.update(round, &participants, round_values)?;
        self.global.install(next)?;
        let valued = valuation.is_some();

        let mut values = vec![0.0; n];
        if let Some(v) = &valuation {
            for (&client, &value) in participants.iter().zip(v.values.iter()) {
                values[client] = value;
            }
        }
        let Valuation {
            evaluations,
            converged,
            ..
        } = valuation.unwrap_or_else(Valuation::empty);

        info!(
            round,
            policy = self.policy.name(),
            participants = participants.len(),
            test_loss = metrics.test.loss,
            test_accuracy = metrics.test.accuracy,
            "round complete"
        );

        self.history.push(RoundRecord {
            round,
            participants,
            selected,
            values,
            valued,
            evaluations,
            converged,
            phase,
            metrics,
            diagnostics,
        });
        self.round += 1;
        Ok(&self.history.entries()[round])
    }

    /// Run every remaining round and return the summary.
    pub fn run(mut self) -> Result<RunSummary, FedShapError> {
        while !self.is_finished() {
            self.step()?;
        }
        let n = self.clients.len();
        Ok(RunSummary {
            selection_counts: self.history.selection_counts(n),
            cumulative_values: self.history.cumulative_values(n),
            final_state: self.policy.state().cloned(),
            final_model: self.global.into_state(),
            history: self.history,
        })
    }

    /// Rerun the configuration from the initial model once per seed.
    ///
    /// Each run gets fresh policy, model, and generator state; this
    /// simulation is left untouched.
    pub fn run_repeated(&self, seeds: &[u64]) -> Result<Vec<RunSummary>, FedShapError> {
        seeds
            .iter()
            .map(|&seed| {
                let config = RunConfig {
                    seed,
                    ..self.config.clone()
                };
                Simulation::new(config, self.clients, &self.initial, self.trainer, self.evaluator)?
                    .run()
            })
            .collect()
    }

    fn evaluate(&self, model: &ModelState) -> Result<RoundMetrics, FedShapError> {
        Ok(RoundMetrics {
            train: self.evaluator.evaluate(model, DataSplit::Train)?,
            validation: self.evaluator.evaluate(model, DataSplit::Validation)?,
            test: self.evaluator.evaluate(model, DataSplit::Test)?,
        })
    }
}

/// Run every estimator on `game` and score the sampling ones against exact values.
fn compare_estimators<G: CoalitionGame>(
    estimator: &ShapleyEstimator,
    game: &G,
    rng: &mut StdRng,
) -> Result<Vec<ValuationDiagnostics>, FedShapError> {
    let exact = exact_shapley(game)?;
    let mut diagnostics = Vec::with_capacity(ShapleyMethod::ALL.len());
    for method in ShapleyMethod::ALL {
        let diag = if method == ShapleyMethod::Exact {
            ValuationDiagnostics {
                method,
                evaluations: exact.evaluations,
                cosine_distance_to_exact: None,
            }
        } else {
            let estimate = estimator.estimate_with(method, game, rng)?;
            ValuationDiagnostics {
                method,
                evaluations: estimate.evaluations,
                cosine_distance_to_exact: cosine_distance(&estimate.values, &exact.values),
            }
        };
        diagnostics.push(diag);
    }
    Ok(diagnostics)
}

fn validate_clients(clients: &[Client]) -> Result<(), FedShapError> {
    if clients.is_empty() {
        return Err(FedShapError::InvalidConfig(
            "population must contain at least one client".into(),
        ));
    }
    for (i, client) in clients.iter().enumerate() {
        if client.id != i {
            return Err(FedShapError::InvalidConfig(format!(
                "client at index {} has id {}",
                i, client.id
            )));
        }
        if !client.weight.is_finite() || client.weight <= 0.0 {
            return Err(FedShapError::InvalidWeight(client.weight));
        }
    }
    Ok(())
}

/// Participation indicator for a non-empty, in-range, duplicate-free selection.
fn validate_selection(participants: &[usize], num_clients: usize) -> Result<Vec<bool>, FedShapError> {
    if participants.is_empty() {
        return Err(FedShapError::InvalidSelection("no clients selected".into()));
    }
    let mut selected = vec![false; num_clients];
    for &i in participants {
        if i >= num_clients {
            return Err(FedShapError::UnknownClient(i));
        }
        if selected[i] {
            return Err(FedShapError::InvalidSelection(format!(
                "client {} selected twice",
                i
            )));
        }
        selected[i] = true;
    }
    Ok(selected)
}
