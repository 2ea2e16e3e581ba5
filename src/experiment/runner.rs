use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use log::{info, warn};
use serde::Serialize;

use super::stats::{Comparison, Summary, mean, sample_std};
use crate::{
    configs::{ExperimentConfig, StrategyConfig},
    data::DatasetProvider,
    error::Result,
    model::{SoftmaxRegression, TrainableModel},
    orchestration::{OrchestratorConfig, RunHistory, StrategyBuilder},
    participants::ParticipantId,
    report::EvaluationLog,
    transport::{LocalParticipant, ParticipantClient},
};

/// Accuracy of a round across executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundStats {
    pub round: usize,
    pub mean: f64,
    pub std: f64,
    pub samples: usize,
}

/// Everything a single execution leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub execution: usize,
    pub seed: u64,
    pub completed: bool,
    pub error: Option<String>,
    pub history: RunHistory,
    pub usage: BTreeMap<ParticipantId, u64>,
}

/// Aggregated results of every execution of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub strategy: StrategyConfig,
    pub per_round: Vec<RoundStats>,
    /// Statistics of the final accuracy of the completed executions.
    pub final_accuracy: Option<Summary>,
    pub executions: Vec<ExecutionOutcome>,
}

impl StrategySummary {
    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn new(strategy: StrategyConfig, rounds: usize, executions: Vec<ExecutionOutcome>) -> Self {
        let per_round = (1..=rounds)
            .filter_map(|round| {
                let values: Vec<_> = executions
                    .iter()
                    .filter_map(|e| e.history.rounds().get(round - 1))
                    .filter_map(|r| r.accuracy())
                    .filter(|a| a.is_finite())
                    .collect();

                Some(RoundStats {
                    round,
                    mean: mean(&values)?,
                    std: sample_std(&values),
                    samples: values.len(),
                })
            })
            .collect();

        let finals: Vec<_> = executions
            .iter()
            .filter(|e| e.completed)
            .filter_map(|e| e.history.last().and_then(|r| r.accuracy()))
            .collect();

        Self {
            strategy,
            per_round,
            final_accuracy: Summary::of(&finals),
            executions,
        }
    }
}

/// The outcome of a whole experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub config: ExperimentConfig,
    pub strategies: Vec<StrategySummary>,
    /// The first strategy against the second one.
    pub comparison: Option<Comparison>,
}

impl ExperimentSummary {
    /// Writes the summary as pretty printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Runs every configured strategy `executions` times on a simulated federation.
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    /// Creates a new `ExperimentRunner`.
    ///
    /// # Returns
    /// The runner or an `InvalidConfig` error.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Runs the experiment.
    ///
    /// Failed executions are kept in the summary with their partial history, only
    /// configuration and io problems abort the experiment.
    pub async fn run(&self) -> Result<ExperimentSummary> {
        if let Some(dir) = &self.config.output_dir {
            fs::create_dir_all(dir)?;
        }

        let mut strategies = Vec::with_capacity(self.config.strategies.len());

        for strategy in &self.config.strategies {
            let mut executions = Vec::with_capacity(self.config.executions);

            for execution in 0..self.config.executions {
                executions.push(self.run_execution(strategy, execution).await?);
            }

            let summary = StrategySummary::new(strategy.clone(), self.config.rounds, executions);
            if let Some(acc) = &summary.final_accuracy {
                info!(
                    strategy = summary.name(),
                    mean = acc.mean,
                    std = acc.std;
                    "strategy finished"
                );
            }

            strategies.push(summary);
        }

        let comparison = match strategies.as_slice() {
            [a, b, ..] => match (&a.final_accuracy, &b.final_accuracy) {
                (Some(sa), Some(sb)) => Some(Comparison::new((a.name(), sa), (b.name(), sb))),
                _ => None,
            },
            _ => None,
        };

        Ok(ExperimentSummary {
            config: self.config.clone(),
            strategies,
            comparison,
        })
    }

    /// Runs a single execution of `strategy`.
    async fn run_execution(&self, strategy: &StrategyConfig, execution: usize) -> Result<ExecutionOutcome> {
        let config = &self.config;
        let seed = config.seed.wrapping_add(execution as u64);
        let blobs = &config.data.blobs;

        let provider = Arc::new(DatasetProvider::new(
            config.data.clone(),
            config.num_participants,
            seed,
        ));
        provider.partitions()?;

        let model = if config.init_std > 0. {
            SoftmaxRegression::random(blobs.num_features, blobs.num_classes, config.init_std, seed)?
        } else {
            SoftmaxRegression::new(blobs.num_features, blobs.num_classes)
        };

        let orchestrator_config = OrchestratorConfig {
            sampling: config.sampling.clone(),
            training: config.training.clone(),
            round_timeout: config.round_timeout(),
            seed: Some(seed),
            ..Default::default()
        };

        let mut orchestrator = StrategyBuilder::new()
            .with_accuracy_aggregation(config.accuracy_aggregation)
            .build(strategy, model.get_weights(), orchestrator_config)?;

        if let Some(dir) = &config.output_dir {
            let path = dir.join(format!("{}_execution_{execution}.log", strategy.name()));
            let _ = fs::remove_file(&path);
            orchestrator = orchestrator.with_evaluation_log(EvaluationLog::new(path));
        }

        for i in 0..config.num_participants {
            let mut participant = LocalParticipant::new(i, i, Arc::clone(&provider), model.clone());
            if config.dropout > 0. {
                participant = participant.with_dropout(config.dropout, seed.wrapping_mul(1000).wrapping_add(i as u64));
            }

            let client: Arc<dyn ParticipantClient> = Arc::new(participant);
            orchestrator.add_participant(client);
        }

        info!(strategy = strategy.name(), execution = execution; "starting execution");

        let (completed, error) = match orchestrator.run(config.rounds).await {
            Ok(_) => (true, None),
            Err(e) => {
                warn!(strategy = strategy.name(), execution = execution; "execution halted: {e}");
                (false, Some(e.to_string()))
            }
        };

        Ok(ExecutionOutcome {
            execution,
            seed,
            completed,
            error,
            history: orchestrator.history().clone(),
            usage: orchestrator.performance().usage_snapshot(),
        })
    }
}
