use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::{AccuracyAggregation, StrategyConfig};
use crate::{
    data::DataConfig,
    error::{FedError, Result},
    orchestration::{SamplingConfig, TrainingConfig},
};

/// A complete experiment: the simulated federation and the strategies to compare on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub num_participants: usize,
    pub rounds: usize,
    /// Independent runs per strategy, every run offsets the seed.
    pub executions: usize,
    pub seed: u64,
    pub strategies: Vec<StrategyConfig>,
    pub accuracy_aggregation: AccuracyAggregation,
    pub sampling: SamplingConfig,
    pub training: TrainingConfig,
    pub data: DataConfig,
    /// Probability of a participant failing any request.
    pub dropout: f64,
    pub round_timeout_secs: Option<f64>,
    /// Standard deviation of the initial model weights, zero starts from all zeros.
    pub init_std: f32,
    /// Directory receiving the summary and the evaluation logs.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_participants: 10,
            rounds: 10,
            executions: 1,
            seed: 42,
            strategies: vec![
                StrategyConfig::FedAvg,
                StrategyConfig::PerformanceBased {
                    performance_window: 5,
                },
            ],
            accuracy_aggregation: AccuracyAggregation::default(),
            sampling: SamplingConfig {
                fraction_fit: 0.6,
                fraction_evaluate: 0.6,
                ..Default::default()
            },
            training: TrainingConfig::default(),
            data: DataConfig::default(),
            dropout: 0.,
            round_timeout_secs: None,
            init_std: 0.,
            output_dir: None,
        }
    }
}

impl ExperimentConfig {
    /// Reads and validates a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The location of the file.
    ///
    /// # Returns
    /// The configuration, or an io, parsing or validation error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Checks everything that can be checked before running.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FedError::InvalidConfig(msg));

        if self.num_participants == 0 {
            return invalid("at least one participant is required".into());
        }

        if self.rounds == 0 || self.executions == 0 {
            return invalid("rounds and executions must be positive".into());
        }

        if self.strategies.is_empty() {
            return invalid("at least one strategy is required".into());
        }

        for strategy in &self.strategies {
            if strategy.performance_window() == Some(0) {
                return invalid(format!("{}: performance window must be positive", strategy.name()));
            }

            if let StrategyConfig::RandomizedExploration {
                exploration_prob, ..
            } = strategy
                && !(0. ..=1.).contains(exploration_prob)
            {
                return invalid(format!(
                    "exploration probability must be in [0, 1], got {exploration_prob}"
                ));
            }
        }

        let sampling = &self.sampling;
        for (name, fraction) in [
            ("fraction_fit", sampling.fraction_fit),
            ("fraction_evaluate", sampling.fraction_evaluate),
        ] {
            if !(0. ..=1.).contains(&fraction) {
                return invalid(format!("{name} must be in [0, 1], got {fraction}"));
            }
        }

        if sampling.min_available_clients > self.num_participants {
            return invalid(format!(
                "min_available_clients is {} but only {} participants exist",
                sampling.min_available_clients, self.num_participants
            ));
        }

        if sampling.clients_per_round == Some(0) {
            return invalid("clients_per_round must be positive".into());
        }

        if !(0. ..=1.).contains(&self.dropout) {
            return invalid(format!("dropout must be in [0, 1], got {}", self.dropout));
        }

        if let Some(secs) = self.round_timeout_secs
            && !(secs > 0. && Duration::try_from_secs_f64(secs).is_ok())
        {
            return invalid(format!("round timeout must be a positive duration, got {secs}"));
        }

        let lr = self.training.learning_rate;
        if lr.is_nan() || lr <= 0. || self.training.local_epochs == 0 {
            return invalid("learning rate and local epochs must be positive".into());
        }

        if !(0. ..1.).contains(&self.data.test_fraction) {
            return invalid(format!(
                "test fraction must be in [0, 1), got {}",
                self.data.test_fraction
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{
                "rounds": 3,
                "strategies": [{"kind": "performance_based", "performance_window": 3}],
                "sampling": {"clients_per_round": 4},
                "data": {"partitioner": {"kind": "dirichlet", "alpha": 0.5}}
            }"#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.rounds, 3);
        assert_eq!(config.num_participants, 10);
        assert_eq!(config.sampling.clients_per_round, Some(4));
        assert_eq!(config.sampling.min_fit_clients, 2);
        assert_eq!(config.data.test_fraction, 0.2);
    }

    #[test]
    fn rejects_bad_exploration_prob() {
        let config = ExperimentConfig {
            strategies: vec![StrategyConfig::RandomizedExploration {
                performance_window: 5,
                exploration_prob: 1.5,
            }],
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(FedError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_unsatisfiable_availability() {
        let mut config = ExperimentConfig::default();
        config.sampling.min_available_clients = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_timeout_must_fit_a_duration() {
        let mut config = ExperimentConfig {
            round_timeout_secs: Some(1e19),
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.round_timeout(), Some(Duration::from_secs_f64(1e19)));

        for secs in [1e20, f64::INFINITY, f64::NAN, 0.] {
            config.round_timeout_secs = Some(secs);
            assert!(config.validate().is_err(), "{secs} accepted");
        }
    }
}
