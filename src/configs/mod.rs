mod experiment;
mod strategy;

pub use experiment::ExperimentConfig;
pub use strategy::{AccuracyAggregation, StrategyConfig};
