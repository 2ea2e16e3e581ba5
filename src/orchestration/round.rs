use std::fmt;

use serde::{Deserialize, Serialize};

/// Per round configuration sent to every selected participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// The current round, starting at 1.
    pub round: usize,
    pub total_rounds: usize,
    pub local_epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
}

impl RoundConfig {
    /// Creates a `RoundConfig` with the default training parameters.
    pub fn new(round: usize, total_rounds: usize) -> Self {
        Self {
            round,
            total_rounds,
            local_epochs: 1,
            learning_rate: 0.05,
            batch_size: 32,
        }
    }
}

/// Where the orchestrator stands within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    ConfiguringFit,
    AwaitingFitResults,
    AggregatingFit,
    ConfiguringEvaluate,
    AwaitingEvaluateResults,
    AggregatingEvaluate,
    Done,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ConfiguringFit => "configuring fit",
            Self::AwaitingFitResults => "awaiting fit results",
            Self::AggregatingFit => "aggregating fit",
            Self::ConfiguringEvaluate => "configuring evaluate",
            Self::AwaitingEvaluateResults => "awaiting evaluate results",
            Self::AggregatingEvaluate => "aggregating evaluate",
            Self::Done => "done",
        };

        f.write_str(name)
    }
}

/// The local training parameters handed to participants every round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub local_epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let RoundConfig {
            local_epochs,
            learning_rate,
            batch_size,
            ..
        } = RoundConfig::new(0, 0);

        Self {
            local_epochs,
            learning_rate,
            batch_size,
        }
    }
}

impl TrainingConfig {
    /// Builds the configuration sent during `round`.
    pub fn round_config(&self, round: usize, total_rounds: usize) -> RoundConfig {
        RoundConfig {
            round,
            total_rounds,
            local_epochs: self.local_epochs,
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
        }
    }
}
