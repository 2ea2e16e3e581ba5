use std::{error::Error, fmt, io};

use crate::participants::ParticipantId;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, FedError>;

/// The phase of a round in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fit,
    Evaluate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fit => f.write_str("fit"),
            Phase::Evaluate => f.write_str("evaluate"),
        }
    }
}

/// All errors that can occur while coordinating federated rounds.
#[derive(Debug)]
pub enum FedError {
    /// Fewer participants are available than the round requires.
    InsufficientParticipants { available: usize, required: usize },
    /// Two parameter sets that must be compatible are not.
    ShapeMismatch { detail: String },
    /// Not a single selected participant answered during a round phase.
    RoundFailure { round: usize, phase: Phase },
    /// An aggregation was requested over an empty result list.
    EmptyAggregation,
    /// A participant produced a result that breaks the data model.
    InvalidResult(String),
    /// The referenced participant was never registered.
    UnknownParticipant(ParticipantId),
    /// The run was cancelled while `round` was in flight.
    Cancelled { round: usize },
    /// A parameter frame could not be decoded.
    Codec(String),
    /// Invalid configuration, caught before running.
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl FedError {
    /// Builds a `ShapeMismatch` from anything printable.
    pub(crate) fn shape_mismatch(detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientParticipants {
                available,
                required,
            } => write!(
                f,
                "insufficient participants: {available} available, {required} required"
            ),
            Self::ShapeMismatch { detail } => write!(f, "shape mismatch: {detail}"),
            Self::RoundFailure { round, phase } => {
                write!(f, "round {round} failed: no participant succeeded during {phase}")
            }
            Self::EmptyAggregation => f.write_str("nothing to aggregate"),
            Self::InvalidResult(msg) => write!(f, "invalid participant result: {msg}"),
            Self::UnknownParticipant(id) => write!(f, "unknown participant: {id}"),
            Self::Cancelled { round } => write!(f, "run cancelled during round {round}"),
            Self::Codec(msg) => write!(f, "codec error: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for FedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FedError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for FedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_failure_names_the_phase() {
        let err = FedError::RoundFailure {
            round: 3,
            phase: Phase::Fit,
        };
        assert_eq!(
            err.to_string(),
            "round 3 failed: no participant succeeded during fit"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = FedError::from(io::Error::other("disk full"));
        assert!(err.source().is_some());
    }
}
