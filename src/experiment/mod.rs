mod runner;
mod stats;

pub use runner::{ExecutionOutcome, ExperimentRunner, ExperimentSummary, RoundStats, StrategySummary};
pub use stats::{Comparison, Summary, mean, sample_std};
