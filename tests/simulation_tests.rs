//! End-to-end tests for the round orchestrator

mod common;

use fedshap::{
    average_metrics, Algorithm, Client, DataSplit, FedShapError, PolicyPhase, RunConfig,
    RunHistory, ShapleyMethod, Simulation,
};

fn config(algorithm: Algorithm, select_fraction: f64, rounds: usize, seed: u64) -> RunConfig {
    let mut config = RunConfig::new(algorithm, select_fraction);
    config.rounds = rounds;
    config.local_epochs = 1;
    config.local_batches = 1;
    config.seed = seed;
    config
}

fn selections(history: &RunHistory) -> Vec<Vec<usize>> {
    history
        .entries()
        .iter()
        .map(|r| r.participants.clone())
        .collect()
}

#[test]
fn test_fixed_seed_reproduces_selections() {
    let world = common::Quadratic::new(5, vec![1.0, 2.0], 0.3);
    let clients = common::population(5);
    let initial = world.initial();

    let run = |seed| {
        Simulation::new(
            config(Algorithm::FedAvg, 0.4, 3, seed),
            &clients,
            &initial,
            &world,
            &world,
        )
        .unwrap()
        .run()
        .unwrap()
    };

    let first = run(17);
    let second = run(17);
    assert_eq!(first.history.len(), 3);
    assert_eq!(selections(&first.history), selections(&second.history));
    assert_eq!(first.final_model, second.final_model);
    for record in first.history.entries() {
        assert_eq!(record.participants.len(), 2);
        assert!(!record.valued);
        assert_eq!(record.selected.iter().filter(|&&s| s).count(), 2);
    }
    assert_eq!(first.selection_counts.iter().sum::<usize>(), 6);
    assert!(first.final_state.is_none());
}

#[test]
fn test_training_reduces_test_loss() {
    let world = common::Quadratic::new(6, vec![1.0, -1.0], 0.05);
    let clients = common::population(6);
    let initial = world.initial();
    let summary = Simulation::new(
        config(Algorithm::FedProx { mu: 0.01 }, 0.5, 5, 0),
        &clients,
        &initial,
        &world,
        &world,
    )
    .unwrap()
    .run()
    .unwrap();

    let metrics = summary.history.metrics();
    assert!(metrics[4].test.loss < metrics[0].test.loss);
    assert!(metrics[0].test.loss > metrics[0].train.loss);
}

#[test]
fn test_ucb_run_values_every_round() {
    let world = common::Quadratic::new(6, vec![0.5, 0.5], 0.4);
    let clients = common::population(6);
    let initial = world.initial();
    let mut cfg = config(Algorithm::Ucb { beta: 0.5 }, 0.5, 6, 3);
    cfg.valuation.method = ShapleyMethod::Exact;

    let summary = Simulation::new(cfg, &clients, &initial, &world, &world)
        .unwrap()
        .run()
        .unwrap();

    let entries = summary.history.entries();
    assert_eq!(entries[0].phase, PolicyPhase::WarmUp);
    assert_eq!(entries[0].participants, vec![0, 1, 2]);
    assert_eq!(entries[1].participants, vec![3, 4, 5]);
    assert_eq!(entries[2].phase, PolicyPhase::SteadyState);
    assert!(entries.iter().all(|r| r.valued && r.converged && r.evaluations == 8));

    let state = summary.final_state.unwrap();
    assert_eq!(state.counts, summary.selection_counts);
    let cumulative: f64 = summary.cumulative_values.iter().sum();
    let recorded: f64 = entries.iter().flat_map(|r| r.values.iter()).sum();
    assert!((cumulative - recorded).abs() < 1e-9);
}

#[test]
fn test_sfedavg_run_with_diagnostics() {
    let world = common::Quadratic::new(5, vec![1.0], 0.3);
    let clients = common::population(5);
    let initial = world.initial();
    let mut cfg = config(Algorithm::SFedAvg { alpha: 0.5, beta: 0.5 }, 0.6, 3, 8);
    cfg.valuation.compare_estimators = true;

    let summary = Simulation::new(cfg, &clients, &initial, &world, &world)
        .unwrap()
        .run()
        .unwrap();

    for record in summary.history.entries() {
        assert_eq!(record.participants.len(), 3);
        assert_eq!(record.diagnostics.len(), 3);
        for diag in &record.diagnostics[1..] {
            let distance = diag.cosine_distance_to_exact.unwrap();
            assert!((0.0..=2.0).contains(&distance));
        }
    }
    let json = summary.history.to_json().unwrap();
    let restored = RunHistory::from_json(&json).unwrap();
    assert_eq!(selections(&restored), selections(&summary.history));
    for (a, b) in restored.entries().iter().zip(summary.history.entries()) {
        assert_eq!(a.diagnostics.len(), b.diagnostics.len());
        assert!((a.metrics.test.loss - b.metrics.test.loss).abs() < 1e-12);
    }
}

#[test]
fn test_every_round_valuation_for_power_of_choice() {
    let world = common::Quadratic::new(6, vec![0.0], 0.5);
    let clients = common::population(6);
    let initial = world.initial();
    let mut cfg = config(Algorithm::PowerOfChoice { decay_factor: 0.5 }, 0.34, 2, 1);
    cfg.valuation.every_round = true;

    let mut sim = Simulation::new(cfg, &clients, &initial, &world, &world).unwrap();
    assert_eq!(sim.num_selected(), 3);
    assert_eq!(sim.policy_name(), "power_of_choice");
    let first = sim.step().unwrap();
    assert!(first.valued);
    let mut participants = first.participants.clone();
    participants.sort_unstable();
    // Clients 3, 4, 5 sit furthest from the zero initial model
    assert_eq!(participants, vec![3, 4, 5]);
}

#[test]
fn test_run_repeated_and_average_metrics() {
    let world = common::Quadratic::new(5, vec![1.0, 1.0], 0.2);
    let clients = common::population(5);
    let initial = world.initial();
    let sim = Simulation::new(
        config(Algorithm::FedAvg, 0.4, 4, 0),
        &clients,
        &initial,
        &world,
        &world,
    )
    .unwrap();

    let runs = sim.run_repeated(&[1, 2, 1]).unwrap();
    assert_eq!(runs.len(), 3);
    assert_eq!(selections(&runs[0].history), selections(&runs[2].history));
    assert_eq!(sim.round(), 0);

    let curves: Vec<_> = runs.iter().map(|r| r.history.metrics()).collect();
    let mean = average_metrics(&curves);
    assert_eq!(mean.len(), 4);
    let expected = curves.iter().map(|c| c[3].test.loss).sum::<f64>() / 3.0;
    assert!((mean[3].test.loss - expected).abs() < 1e-12);
}

#[test]
fn test_configuration_errors_fail_fast() {
    let world = common::Quadratic::new(3, vec![0.0], 0.1);
    let clients = common::population(3);
    let initial = world.initial();

    assert!(Simulation::new(config(Algorithm::FedAvg, 0.0, 3, 0), &clients, &initial, &world, &world).is_err());
    assert!(Simulation::new(
        config(Algorithm::PowerOfChoice { decay_factor: 1.5 }, 0.5, 3, 0),
        &clients,
        &initial,
        &world,
        &world
    )
    .is_err());
    assert!(Simulation::new(config(Algorithm::FedAvg, 0.5, 0, 0), &clients, &initial, &world, &world).is_err());

    assert!(matches!(
        RunConfig::from_json(r#"{"algorithm": {"algorithm": "fedprox"}, "select_fraction": 0.5}"#),
        Err(FedShapError::Serialization(_))
    ));
    let parsed = RunConfig::from_json(
        r#"{"algorithm": {"algorithm": "ucb", "beta": 1.0}, "select_fraction": 0.5, "rounds": 2}"#,
    )
    .unwrap();
    assert_eq!(parsed.algorithm, Algorithm::Ucb { beta: 1.0 });
    assert_eq!(parsed.local_epochs, 10);
}

#[test]
fn test_trainer_failure_aborts_round() {
    let world = common::Quadratic::new(4, vec![0.0], 0.1);
    let clients = common::population(4);
    let initial = world.initial();
    let failing = common::FailsFor(0);

    let mut sim = Simulation::new(
        config(Algorithm::FedAvg, 1.0, 2, 0),
        &clients,
        &initial,
        &failing,
        &world,
    )
    .unwrap();
    assert!(matches!(
        sim.step(),
        Err(FedShapError::Training { client: 0, .. })
    ));
    assert!(sim.history().is_empty());
    assert_eq!(sim.global(), &initial);
}

#[test]
fn test_evaluation_failure_leaves_state_unchanged() {
    let world = common::Quadratic::new(4, vec![0.0], 0.1);
    let clients = common::population(4);
    let initial = world.initial();
    let failing = common::FailsOn {
        inner: &world,
        split: DataSplit::Test,
    };

    let mut sim = Simulation::new(
        config(Algorithm::Ucb { beta: 1.0 }, 0.5, 3, 0),
        &clients,
        &initial,
        &world,
        &failing,
    )
    .unwrap();
    assert!(matches!(sim.step(), Err(FedShapError::Evaluation(_))));
    assert_eq!(sim.global(), &initial);
    assert!(sim.history().is_empty());
    assert_eq!(sim.round(), 0);
    let state = sim.policy_state().unwrap();
    assert!(state.counts.iter().all(|&c| c == 0));
}

#[test]
fn test_zero_weight_client_rejected_before_any_round() {
    let world = common::Quadratic::new(4, vec![0.0], 0.1);
    let mut clients = common::population(4);
    clients[0] = Client::new(0, 0.0);
    let initial = world.initial();

    let mut valued = config(Algorithm::Ucb { beta: 1.0 }, 0.5, 3, 0);
    valued.valuation.method = ShapleyMethod::Exact;
    assert!(matches!(
        Simulation::new(valued, &clients, &initial, &world, &world),
        Err(FedShapError::InvalidWeight(w)) if w == 0.0
    ));
    assert!(matches!(
        Simulation::new(config(Algorithm::FedAvg, 0.25, 3, 0), &clients, &initial, &world, &world),
        Err(FedShapError::InvalidWeight(_))
    ));
}
