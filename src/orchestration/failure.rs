use std::fmt;

use serde::Serialize;

use crate::participants::ParticipantId;

/// Why a participant didn't deliver a result during a round phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum FailureKind {
    /// The participant answered with an error.
    Error(String),
    /// The participant didn't answer before the round's deadline.
    TimedOut,
    /// The task serving the participant panicked.
    Panicked,
}

/// A participant that failed during a round phase, non fatal as long as someone succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantFailure {
    pub participant: ParticipantId,
    pub kind: FailureKind,
}

impl ParticipantFailure {
    pub fn new(participant: ParticipantId, kind: FailureKind) -> Self {
        Self { participant, kind }
    }
}

impl fmt::Display for ParticipantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Error(reason) => write!(f, "{} failed: {reason}", self.participant),
            FailureKind::TimedOut => write!(f, "{} timed out", self.participant),
            FailureKind::Panicked => write!(f, "{} panicked", self.participant),
        }
    }
}
