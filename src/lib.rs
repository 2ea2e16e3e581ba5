//! Federated learning round orchestration.
//!
//! A coordinator repeatedly hands the global model to a selection of participants,
//! aggregates their locally trained updates with federated averaging and feeds their
//! performance back into the next round's selection.

pub mod aggregation;
pub mod configs;
pub mod data;
pub mod error;
pub mod experiment;
pub mod history;
pub mod model;
pub mod orchestration;
pub mod parameters;
pub mod participants;
pub mod report;
pub mod results;
pub mod selection;
pub mod transport;

pub use aggregation::{Aggregator, FedAvg};
pub use error::{FedError, Phase, Result};
pub use orchestration::{Orchestrator, OrchestratorConfig, RoundConfig, RunHistory, StrategyBuilder};
pub use parameters::{ParameterSet, WeightCodec};
pub use participants::{Participant, ParticipantId, ParticipantRegistry};
pub use results::{EvaluateResult, FitResult, Metrics};
pub use selection::{SelectionContext, SelectionPolicy};
pub use transport::ParticipantClient;
