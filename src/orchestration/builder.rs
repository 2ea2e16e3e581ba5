use std::{num::NonZeroUsize, sync::Arc};

use super::{Orchestrator, OrchestratorConfig};
use crate::{
    aggregation::{Aggregator, FedAvg, mean_accuracy, weighted_fit_metrics},
    configs::{AccuracyAggregation, StrategyConfig},
    error::{FedError, Result},
    parameters::ParameterSet,
    selection::{
        PerformanceBasedSelection, RandomizedExplorationSelection, SelectionPolicy,
        UniformSelection,
    },
};

/// Builds `Orchestrator`s out of a strategy configuration.
#[derive(Debug, Clone, Default)]
pub struct StrategyBuilder {
    accuracy: AccuracyAggregation,
}

impl StrategyBuilder {
    /// Creates a new `StrategyBuilder`.
    ///
    /// # Returns
    /// A new `StrategyBuilder` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how evaluation accuracies are combined.
    pub fn with_accuracy_aggregation(mut self, accuracy: AccuracyAggregation) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Builds a new `Orchestrator` following a strategy.
    ///
    /// # Arguments
    /// * `strategy` - The selection strategy.
    /// * `initial` - The initial global parameters.
    /// * `config` - The round loop configuration, its performance window is overridden by
    ///   the strategy's.
    ///
    /// # Returns
    /// A new `Orchestrator` or an `InvalidConfig` error.
    pub fn build(
        &self,
        strategy: &StrategyConfig,
        initial: ParameterSet,
        mut config: OrchestratorConfig,
    ) -> Result<Orchestrator> {
        if let Some(window) = strategy.performance_window() {
            config.performance_window = NonZeroUsize::new(window).ok_or_else(|| {
                FedError::InvalidConfig("performance window must be positive".into())
            })?;
        }

        let fit_policy = self.resolve_fit_policy(strategy, config.seed);
        let evaluate_policy = Box::new(UniformSelection::new(config.seed.map(|s| s ^ 0x5eed)));
        let aggregator = self.resolve_aggregator();

        Ok(Orchestrator::new(initial, aggregator, config)
            .with_fit_policy(fit_policy)
            .with_evaluate_policy(evaluate_policy))
    }

    /// Resolves the policy choosing the participants that train.
    ///
    /// # Arguments
    /// * `strategy` - The selection strategy.
    /// * `seed` - The seed of the policy's random source.
    ///
    /// # Returns
    /// The policy.
    fn resolve_fit_policy(
        &self,
        strategy: &StrategyConfig,
        seed: Option<u64>,
    ) -> Box<dyn SelectionPolicy> {
        match *strategy {
            StrategyConfig::FedAvg => Box::new(UniformSelection::new(seed)),
            StrategyConfig::PerformanceBased { .. } => Box::new(PerformanceBasedSelection::new()),
            StrategyConfig::RandomizedExploration {
                exploration_prob, ..
            } => Box::new(RandomizedExplorationSelection::new(exploration_prob, seed)),
        }
    }

    /// Resolves the aggregator, every strategy averages with FedAvg.
    fn resolve_aggregator(&self) -> Box<dyn Aggregator> {
        let fedavg = FedAvg::new().with_fit_metrics(Arc::new(weighted_fit_metrics));

        match self.accuracy {
            AccuracyAggregation::Weighted => Box::new(fedavg),
            AccuracyAggregation::Mean => Box::new(fedavg.with_evaluate_metrics(Arc::new(mean_accuracy))),
        }
    }
}
