use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_PERFORMANCE_WINDOW;

const fn default_window() -> usize {
    DEFAULT_PERFORMANCE_WINDOW.get()
}

const fn default_exploration_prob() -> f64 {
    0.3
}

/// The client selection strategy of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Uniform random selection.
    #[serde(rename = "fedavg")]
    FedAvg,
    /// Score ranking with a guaranteed quota for the least used participants.
    PerformanceBased {
        #[serde(default = "default_window")]
        performance_window: usize,
    },
    /// Score ranking, replaced by a uniform draw with a decaying probability.
    RandomizedExploration {
        #[serde(default = "default_window")]
        performance_window: usize,
        #[serde(default = "default_exploration_prob")]
        exploration_prob: f64,
    },
}

impl StrategyConfig {
    /// The name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FedAvg => "fedavg",
            Self::PerformanceBased { .. } => "performance_based",
            Self::RandomizedExploration { .. } => "randomized_exploration",
        }
    }

    /// The size of the performance window, `None` if the strategy doesn't keep one.
    pub fn performance_window(&self) -> Option<usize> {
        match *self {
            Self::FedAvg => None,
            Self::PerformanceBased { performance_window }
            | Self::RandomizedExploration {
                performance_window,
                ..
            } => Some(performance_window),
        }
    }
}

/// How the participants' evaluation accuracies are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyAggregation {
    /// Weighted by the participants' sample counts.
    #[default]
    Weighted,
    /// Plain mean over the participants that report it.
    Mean,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_strategies() {
        let strategies: Vec<StrategyConfig> = serde_json::from_str(
            r#"[
                {"kind": "fedavg"},
                {"kind": "performance_based"},
                {"kind": "randomized_exploration", "exploration_prob": 0.5}
            ]"#,
        )
        .unwrap();

        assert_eq!(strategies[0], StrategyConfig::FedAvg);
        assert_eq!(strategies[1].performance_window(), Some(5));
        assert_eq!(
            strategies[2],
            StrategyConfig::RandomizedExploration {
                performance_window: 5,
                exploration_prob: 0.5
            }
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(serde_json::from_str::<StrategyConfig>(r#"{"kind": "krum"}"#).is_err());
    }
}
