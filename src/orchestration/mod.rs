mod builder;
mod dispatch;
mod failure;
mod history;
mod orchestrator;
mod round;
mod sampling;

pub use builder::StrategyBuilder;
pub use dispatch::{DispatchCancelled, Gathered, scatter_gather};
pub use failure::{FailureKind, ParticipantFailure};
pub use history::{ParticipantEvaluation, RoundRecord, RunHistory};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use round::{RoundConfig, RoundPhase, TrainingConfig};
pub use sampling::SamplingConfig;
