use std::{collections::BTreeMap, num::NonZeroUsize};

use crate::parameters::ParameterSet;

/// Named scalar metrics reported by participants and aggregators.
pub type Metrics = BTreeMap<String, f64>;

/// Well known metric key for classification accuracy.
pub const ACCURACY: &str = "accuracy";
/// Well known metric key for the training or evaluation loss.
pub const LOSS: &str = "loss";

/// The outcome of a participant's local training.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub parameters: ParameterSet,
    pub sample_count: NonZeroUsize,
    pub metrics: Metrics,
}

impl FitResult {
    pub fn new(parameters: ParameterSet, sample_count: NonZeroUsize, metrics: Metrics) -> Self {
        Self {
            parameters,
            sample_count,
            metrics,
        }
    }
}

/// The outcome of a participant's local evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateResult {
    pub loss: f64,
    pub sample_count: NonZeroUsize,
    pub metrics: Metrics,
}

impl EvaluateResult {
    pub fn new(loss: f64, sample_count: NonZeroUsize, metrics: Metrics) -> Self {
        Self {
            loss,
            sample_count,
            metrics,
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.metrics.get(ACCURACY).copied()
    }
}
