//! Run configuration.
//!
//! A [`RunConfig`] is built once, validated, and handed to the
//! [`Simulation`](crate::Simulation) by value. Each [`Algorithm`] variant
//! carries exactly the hyperparameters it needs, so a missing option is
//! caught when the variant is constructed rather than mid-run.

use serde::{Deserialize, Serialize};

use crate::error::FedShapError;
use crate::traits::LocalTraining;
use crate::valuation::ValuationConfig;

/// Client selection / aggregation algorithm family.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AlgorithmOptions", into = "AlgorithmOptions")]
pub enum Algorithm {
    /// Uniform random selection, plain local SGD
    FedAvg,
    /// Uniform random selection, proximal local objective
    FedProx {
        /// Proximal coefficient
        mu: f32,
    },
    /// Softmax-preference selection driven by Shapley values
    SFedAvg {
        /// Weight on the previous preference
        alpha: f64,
        /// Weight on the running Shapley value
        beta: f64,
    },
    /// Loss-biased selection from a shrinking candidate pool
    PowerOfChoice {
        /// Per-round multiplicative decay of the candidate pool
        decay_factor: f64,
    },
    /// Upper-confidence-bound bandit over Shapley values
    Ucb {
        /// Exploration coefficient
        beta: f64,
    },
}

/// Flat, name-keyed form of an algorithm choice, as found in config files.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmOptions {
    /// One of `fedavg`, `fedprox`, `sfedavg`, `poc`, `ucb`
    pub algorithm: String,
    /// FedProx proximal coefficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mu: Option<f32>,
    /// S-FedAvg preference memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    /// S-FedAvg value weight, or UCB exploration coefficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    /// Power-of-choice pool decay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_factor: Option<f64>,
}

impl AlgorithmOptions {
    /// Options with only the algorithm name set.
    pub fn named(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            ..Self::default()
        }
    }
}

impl Algorithm {
    /// Build a variant from its name and the available options.
    ///
    /// Options the chosen algorithm does not use are ignored.
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, FedShapError> {
        let algorithm = match options.algorithm.as_str() {
            "fedavg" => Algorithm::FedAvg,
            "fedprox" => Algorithm::FedProx {
                mu: options.mu.ok_or(FedShapError::MissingOption {
                    algorithm: "fedprox",
                    option: "mu",
                })?,
            },
            "sfedavg" => {
                let (alpha, beta) = match (options.alpha, options.beta) {
                    (Some(alpha), Some(beta)) => (alpha, beta),
                    (Some(alpha), None) => (alpha, 1.0 - alpha),
                    (None, Some(beta)) => (1.0 - beta, beta),
                    (None, None) => {
                        return Err(FedShapError::MissingOption {
                            algorithm: "sfedavg",
                            option: "alpha or beta",
                        })
                    }
                };
                Algorithm::SFedAvg { alpha, beta }
            }
            "poc" => Algorithm::PowerOfChoice {
                decay_factor: options.decay_factor.ok_or(FedShapError::MissingOption {
                    algorithm: "poc",
                    option: "decay_factor",
                })?,
            },
            "ucb" => Algorithm::Ucb {
                beta: options.beta.ok_or(FedShapError::MissingOption {
                    algorithm: "ucb",
                    option: "beta",
                })?,
            },
            other => return Err(FedShapError::UnknownAlgorithm(other.to_string())),
        };
        algorithm.validate()?;
        Ok(algorithm)
    }

    /// Config-file name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::FedAvg => "fedavg",
            Algorithm::FedProx { .. } => "fedprox",
            Algorithm::SFedAvg { .. } => "sfedavg",
            Algorithm::PowerOfChoice { .. } => "poc",
            Algorithm::Ucb { .. } => "ucb",
        }
    }

    /// Check hyperparameter ranges.
    pub fn validate(&self) -> Result<(), FedShapError> {
        match *self {
            Algorithm::FedAvg => Ok(()),
            Algorithm::FedProx { mu } => check(mu.is_finite() && mu >= 0.0, || {
                format!("fedprox mu must be finite and non-negative, got {}", mu)
            }),
            Algorithm::SFedAvg { alpha, beta } => {
                check(alpha.is_finite() && beta.is_finite(), || {
                    format!("sfedavg alpha/beta must be finite, got {}/{}", alpha, beta)
                })
            }
            Algorithm::PowerOfChoice { decay_factor } => {
                check(decay_factor > 0.0 && decay_factor <= 1.0, || {
                    format!("poc decay_factor must be in (0, 1], got {}", decay_factor)
                })
            }
            Algorithm::Ucb { beta } => check(beta.is_finite() && beta >= 0.0, || {
                format!("ucb beta must be finite and non-negative, got {}", beta)
            }),
        }
    }

    /// FedProx proximal coefficient, if any.
    pub fn proximal_mu(&self) -> Option<f32> {
        match *self {
            Algorithm::FedProx { mu } => Some(mu),
            _ => None,
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), FedShapError> {
    if ok {
        Ok(())
    } else {
        Err(FedShapError::InvalidConfig(message()))
    }
}

impl TryFrom<AlgorithmOptions> for Algorithm {
    type Error = FedShapError;

    fn try_from(options: AlgorithmOptions) -> Result<Self, Self::Error> {
        Algorithm::from_options(&options)
    }
}

impl From<Algorithm> for AlgorithmOptions {
    fn from(algorithm: Algorithm) -> Self {
        let mut options = AlgorithmOptions::named(algorithm.name());
        match algorithm {
            Algorithm::FedAvg => {}
            Algorithm::FedProx { mu } => options.mu = Some(mu),
            Algorithm::SFedAvg { alpha, beta } => {
                options.alpha = Some(alpha);
                options.beta = Some(beta);
            }
            Algorithm::PowerOfChoice { decay_factor } => options.decay_factor = Some(decay_factor),
            Algorithm::Ucb { beta } => options.beta = Some(beta),
        }
        options
    }
}

/// Immutable configuration of one simulated run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Selection / aggregation algorithm
    pub algorithm: Algorithm,
    /// Fraction of clients selected per round, in `(0, 1]`
    pub select_fraction: f64,
    /// Local epochs (`E`)
    #[serde(default = "default_local_epochs")]
    pub local_epochs: usize,
    /// Local batches (`B`)
    #[serde(default = "default_local_batches")]
    pub local_batches: usize,
    /// Number of rounds (`T`)
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Local learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Local momentum
    #[serde(default = "default_momentum")]
    pub momentum: f32,
    /// Seed of the run's random generator
    #[serde(default)]
    pub seed: u64,
    /// Shapley estimation settings
    #[serde(default)]
    pub valuation: ValuationConfig,
}

fn default_local_epochs() -> usize {
    10
}

fn default_local_batches() -> usize {
    10
}

fn default_rounds() -> usize {
    100
}

fn default_learning_rate() -> f32 {
    0.01
}

fn default_momentum() -> f32 {
    0.5
}

impl RunConfig {
    /// Configuration with the default training hyperparameters.
    pub fn new(algorithm: Algorithm, select_fraction: f64) -> Self {
        Self {
            algorithm,
            select_fraction,
            local_epochs: default_local_epochs(),
            local_batches: default_local_batches(),
            rounds: default_rounds(),
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
            seed: 0,
            valuation: ValuationConfig::default(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, FedShapError> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field; called before any round runs.
    pub fn validate(&self) -> Result<(), FedShapError> {
        self.algorithm.validate()?;
        self.valuation.validate()?;
        check(
            self.select_fraction > 0.0 && self.select_fraction <= 1.0,
            || format!("select_fraction must be in (0, 1], got {}", self.select_fraction),
        )?;
        check(self.rounds > 0, || "rounds must be at least 1".to_string())?;
        check(self.learning_rate.is_finite() && self.learning_rate > 0.0, || {
            format!("learning_rate must be positive, got {}", self.learning_rate)
        })?;
        check(self.momentum.is_finite() && self.momentum >= 0.0, || {
            format!("momentum must be non-negative, got {}", self.momentum)
        })
    }

    /// Local training hyperparameters handed to the trainer.
    pub fn local_training(&self) -> LocalTraining {
        LocalTraining {
            epochs: self.local_epochs,
            batches: self.local_batches,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            proximal_mu: self.algorithm.proximal_mu(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fedprox_requires_mu() {
        let err = Algorithm::from_options(&AlgorithmOptions::named("fedprox")).unwrap_err();
        assert!(matches!(
            err,
            FedShapError::MissingOption {
                algorithm: "fedprox",
                option: "mu"
            }
        ));
    }

    #[test]
    fn test_sfedavg_complement_defaults() {
        let only_alpha = AlgorithmOptions {
            alpha: Some(0.25),
            ..AlgorithmOptions::named("sfedavg")
        };
        assert_eq!(
            Algorithm::from_options(&only_alpha).unwrap(),
            Algorithm::SFedAvg {
                alpha: 0.25,
                beta: 0.75
            }
        );

        let only_beta = AlgorithmOptions {
            beta: Some(0.1),
            ..AlgorithmOptions::named("sfedavg")
        };
        match Algorithm::from_options(&only_beta).unwrap() {
            Algorithm::SFedAvg { alpha, beta } => {
                assert!((alpha - 0.9).abs() < 1e-12);
                assert!((beta - 0.1).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(Algorithm::from_options(&AlgorithmOptions::named("sfedavg")).is_err());
    }

    #[test]
    fn test_sfedavg_keeps_both_when_given() {
        let both = AlgorithmOptions {
            alpha: Some(0.5),
            beta: Some(2.0),
            ..AlgorithmOptions::named("sfedavg")
        };
        assert_eq!(
            Algorithm::from_options(&both).unwrap(),
            Algorithm::SFedAvg {
                alpha: 0.5,
                beta: 2.0
            }
        );
    }

    #[test]
    fn test_poc_and_ucb_requirements() {
        assert!(Algorithm::from_options(&AlgorithmOptions::named("poc")).is_err());
        assert!(Algorithm::from_options(&AlgorithmOptions::named("ucb")).is_err());

        let bad_decay = AlgorithmOptions {
            decay_factor: Some(1.5),
            ..AlgorithmOptions::named("poc")
        };
        assert!(matches!(
            Algorithm::from_options(&bad_decay),
            Err(FedShapError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(matches!(
            Algorithm::from_options(&AlgorithmOptions::named("fedsgd")),
            Err(FedShapError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_run_config_from_json_defaults() {
        let config = RunConfig::from_json(
            r#"{"algorithm": {"algorithm": "ucb", "beta": 1.0}, "select_fraction": 0.1}"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::Ucb { beta: 1.0 });
        assert_eq!(config.local_epochs, 10);
        assert_eq!(config.rounds, 100);
        assert_eq!(config.local_training().proximal_mu, None);
    }

    #[test]
    fn test_run_config_from_json_rejects_missing_option() {
        let result =
            RunConfig::from_json(r#"{"algorithm": {"algorithm": "poc"}, "select_fraction": 0.1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_config_validate_fraction() {
        let mut config = RunConfig::new(Algorithm::FedAvg, 0.0);
        assert!(config.validate().is_err());
        config.select_fraction = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fedprox_mu_reaches_trainer() {
        let config = RunConfig::new(Algorithm::FedProx { mu: 0.01 }, 0.2);
        assert_eq!(config.local_training().proximal_mu, Some(0.01));
    }

    #[test]
    fn test_algorithm_serde_roundtrip() {
        let algorithm = Algorithm::PowerOfChoice { decay_factor: 0.9 };
        let json = serde_json::to_string(&algorithm).unwrap();
        assert_eq!(json, r#"{"algorithm":"poc","decay_factor":0.9}"#);
        let restored: Algorithm = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, algorithm);
    }
}
