//! Quickstart: UCB client selection driven by per-round Shapley values
//!
//! Run with `RUST_LOG=fedshap=info cargo run --example quickstart`.

use fedshap::{
    Algorithm, Client, DataSplit, EvalMetrics, Evaluator, FedShapError, LocalTraining, ModelState,
    RunConfig, Simulation, Trainer,
};
use ndarray::Array2;
use tracing_subscriber::EnvFilter;

/// Toy federation: every client pulls the model toward its own optimum.
/// Clients 0..7 agree on the true optimum; clients 7..10 carry noisy data.
struct PullToward {
    targets: Vec<[f32; 2]>,
    optimum: [f32; 2],
}

impl PullToward {
    fn distance_sq(model: &ModelState, point: &[f32; 2]) -> f64 {
        model.layers()[0]
            .iter()
            .zip(point.iter())
            .map(|(&x, &p)| ((x - p) as f64).powi(2))
            .sum()
    }
}

impl Trainer for PullToward {
    fn train(
        &self,
        global: &ModelState,
        client: &Client,
        params: &LocalTraining,
    ) -> Result<ModelState, FedShapError> {
        let target = self.targets[client.id];
        let mut layer = global.layers()[0].clone();
        let step = (params.learning_rate * 50.0).min(1.0);
        for (x, t) in layer.iter_mut().zip(target.iter()) {
            *x += step * (t - *x);
        }
        Ok(ModelState::from(layer))
    }
}

impl Evaluator for PullToward {
    fn evaluate(&self, model: &ModelState, _split: DataSplit) -> Result<EvalMetrics, FedShapError> {
        let loss = Self::distance_sq(model, &self.optimum);
        Ok(EvalMetrics {
            loss,
            accuracy: (-loss).exp(),
        })
    }

    fn client_loss(&self, model: &ModelState, client: &Client) -> Result<f64, FedShapError> {
        Ok(Self::distance_sq(model, &self.targets[client.id]))
    }
}

fn main() -> Result<(), FedShapError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("fedshap Quickstart Demo\n");

    let optimum = [1.0, -2.0];
    let targets: Vec<[f32; 2]> = (0..10)
        .map(|i| {
            if i < 7 {
                [optimum[0] + 0.05 * i as f32, optimum[1] - 0.05 * i as f32]
            } else {
                [optimum[0] + 4.0, optimum[1] + 4.0]
            }
        })
        .collect();
    let world = PullToward { targets, optimum };
    let clients: Vec<Client> = (0..10).map(|i| Client::new(i, 100.0)).collect();
    let initial = ModelState::from(Array2::zeros((1, 2)));

    let mut config = RunConfig::new(Algorithm::Ucb { beta: 0.1 }, 0.3);
    config.rounds = 30;
    config.seed = 7;

    println!("Simulating 10 clients (7 consistent, 3 noisy), 3 per round...\n");
    let summary = Simulation::new(config, &clients, &initial, &world, &world)?.run()?;

    println!("Selection counts:  {:?}", summary.selection_counts);
    let values: Vec<String> = summary
        .cumulative_values
        .iter()
        .map(|v| format!("{:.3}", v))
        .collect();
    println!("Cumulative values: [{}]", values.join(", "));
    if let Some(last) = summary.history.entries().last() {
        println!("Final test loss:   {:.4}", last.metrics.test.loss);
    }
    println!("\nNoisy clients 7..10 should be selected least after warm-up.");
    Ok(())
}
