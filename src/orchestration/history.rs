use serde::Serialize;

use super::ParticipantFailure;
use crate::{
    participants::ParticipantId,
    results::{ACCURACY, Metrics},
};

/// Per participant outcome of a round's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantEvaluation {
    pub participant: ParticipantId,
    pub loss: f64,
    pub accuracy: Option<f64>,
}

/// Everything observed during a completed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: usize,
    /// The aggregated evaluation loss.
    pub loss: f64,
    /// The aggregated evaluation metrics.
    pub metrics: Metrics,
    /// The aggregated fit metrics.
    pub fit_metrics: Metrics,
    /// The participants whose fit results were aggregated.
    pub fit_participants: Vec<ParticipantId>,
    /// The participants whose evaluate results were aggregated.
    pub evaluate_participants: Vec<ParticipantId>,
    pub evaluations: Vec<ParticipantEvaluation>,
    pub failures: Vec<ParticipantFailure>,
}

impl RoundRecord {
    pub fn accuracy(&self) -> Option<f64> {
        self.metrics.get(ACCURACY).copied()
    }
}

/// Round indexed results of a run, only ever appended to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunHistory {
    rounds: Vec<RoundRecord>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: RoundRecord) {
        self.rounds.push(record);
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn last(&self) -> Option<&RoundRecord> {
        self.rounds.last()
    }

    /// The aggregated accuracy of every round, `NaN` where it wasn't reported.
    pub fn accuracies(&self) -> Vec<f64> {
        self.rounds
            .iter()
            .map(|r| r.accuracy().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn losses(&self) -> Vec<f64> {
        self.rounds.iter().map(|r| r.loss).collect()
    }
}
