use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{
    ParticipantEvaluation, RoundPhase, RoundRecord, RunHistory, SamplingConfig, TrainingConfig,
    dispatch::scatter_gather,
};
use crate::{
    aggregation::Aggregator,
    error::{FedError, Phase, Result},
    history::{DEFAULT_PERFORMANCE_WINDOW, PerformanceStore, derive_score},
    parameters::ParameterSet,
    participants::{Participant, ParticipantId, ParticipantRegistry},
    report::EvaluationLog,
    selection::{SelectionContext, SelectionPolicy},
    transport::ParticipantClient,
};

/// Knobs of the round loop that don't depend on the strategy.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub sampling: SamplingConfig,
    pub training: TrainingConfig,
    /// The longest a phase waits for its slowest participant, `None` waits forever.
    pub round_timeout: Option<Duration>,
    pub performance_window: NonZeroUsize,
    /// Seeds the fallback uniform sampling.
    pub seed: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            training: TrainingConfig::default(),
            round_timeout: None,
            performance_window: DEFAULT_PERFORMANCE_WINDOW,
            seed: None,
        }
    }
}

/// Drives the federated round loop.
///
/// Every round selects participants, trains on them, aggregates their updates into the
/// new global parameters, feeds their scores into the performance history and finally
/// evaluates the new parameters on a second selection.
pub struct Orchestrator {
    registry: ParticipantRegistry,
    clients: HashMap<ParticipantId, Arc<dyn ParticipantClient>>,
    fit_policy: Option<Box<dyn SelectionPolicy>>,
    evaluate_policy: Option<Box<dyn SelectionPolicy>>,
    aggregator: Box<dyn Aggregator>,
    performance: PerformanceStore,
    config: OrchestratorConfig,
    parameters: Arc<ParameterSet>,
    phase: RoundPhase,
    history: RunHistory,
    cancel: CancellationToken,
    log: Option<EvaluationLog>,
}

impl Orchestrator {
    /// Creates a new `Orchestrator`.
    ///
    /// Both phases sample uniformly at random until a policy is set.
    ///
    /// # Arguments
    /// * `initial` - The initial global parameters.
    /// * `aggregator` - The aggregation strategy.
    /// * `config` - The round loop configuration.
    ///
    /// # Returns
    /// A new `Orchestrator` instance.
    pub fn new(initial: ParameterSet, aggregator: Box<dyn Aggregator>, config: OrchestratorConfig) -> Self {
        Self {
            registry: ParticipantRegistry::new(config.seed),
            clients: HashMap::new(),
            fit_policy: None,
            evaluate_policy: None,
            aggregator,
            performance: PerformanceStore::new(config.performance_window),
            config,
            parameters: Arc::new(initial),
            phase: RoundPhase::Idle,
            history: RunHistory::new(),
            cancel: CancellationToken::new(),
            log: None,
        }
    }

    pub fn with_fit_policy(mut self, policy: Box<dyn SelectionPolicy>) -> Self {
        self.fit_policy = Some(policy);
        self
    }

    pub fn with_evaluate_policy(mut self, policy: Box<dyn SelectionPolicy>) -> Self {
        self.evaluate_policy = Some(policy);
        self
    }

    /// Ties the run to an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Appends every round's per participant evaluation to `log`.
    pub fn with_evaluation_log(mut self, log: EvaluationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Registers a participant reachable through `client`.
    ///
    /// # Returns
    /// Whether the participant was not known before.
    pub fn add_participant(&mut self, client: Arc<dyn ParticipantClient>) -> bool {
        let id = client.id().clone();
        self.clients.insert(id.clone(), client);
        self.registry.register(Participant::new(id))
    }

    /// Changes the availability of a registered participant.
    pub fn set_available(&mut self, id: &ParticipantId, available: bool) -> Result<()> {
        self.registry.set_available(id, available)
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn performance(&self) -> &PerformanceStore {
        &self.performance
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `rounds` more rounds.
    ///
    /// Round numbering continues after the rounds already in the history, so calling
    /// `run` again extends the same run. The run halts on the first failed round, the
    /// history of every completed round is kept either way.
    ///
    /// # Arguments
    /// * `rounds` - The amount of rounds to run.
    ///
    /// # Returns
    /// The run's history or the error that halted it.
    pub async fn run(&mut self, rounds: usize) -> Result<RunHistory> {
        let first = self.history.len() + 1;
        let total_rounds = self.history.len() + rounds;

        for round in first..=total_rounds {
            if self.cancel.is_cancelled() {
                self.phase = RoundPhase::Idle;
                return Err(FedError::Cancelled { round });
            }

            if let Err(e) = self.run_round(round, total_rounds).await {
                warn!(round = round; "round halted: {e}");
                self.phase = RoundPhase::Idle;
                return Err(e);
            }
        }

        self.phase = RoundPhase::Done;
        Ok(self.history.clone())
    }

    async fn run_round(&mut self, round: usize, total_rounds: usize) -> Result<()> {
        debug!(round = round, total = total_rounds; "starting round");
        let round_config = self.config.training.round_config(round, total_rounds);

        self.phase = RoundPhase::ConfiguringFit;
        let num_fit = self.config.sampling.num_fit(self.registry.num_available());
        let selected = self.select(round, total_rounds, num_fit, Phase::Fit)?;
        debug!(round = round, selected = selected.len(); "configured fit");

        self.phase = RoundPhase::AwaitingFitResults;
        let params = Arc::clone(&self.parameters);
        let config = round_config.clone();
        let (fit_results, mut failures) =
            scatter_gather(selected, self.config.round_timeout, &self.cancel, |client| {
                let params = Arc::clone(&params);
                let config = config.clone();
                async move { client.fit(params, config).await }
            })
            .await
            .map_err(|_| FedError::Cancelled { round })?;

        if fit_results.is_empty() {
            return Err(FedError::RoundFailure {
                round,
                phase: Phase::Fit,
            });
        }

        self.phase = RoundPhase::AggregatingFit;
        let (new_params, fit_metrics) = self.aggregator.aggregate_fit(&fit_results)?;
        self.parameters.ensure_compatible(&new_params)?;
        self.parameters = Arc::new(new_params);

        for (participant, result) in &fit_results {
            let score = derive_score(&result.metrics, round, total_rounds);
            self.performance.record(&participant.id, score);
        }

        self.phase = RoundPhase::ConfiguringEvaluate;
        let num_evaluate = self.config.sampling.num_evaluate(self.registry.num_available());
        let selected = self.select(round, total_rounds, num_evaluate, Phase::Evaluate)?;
        debug!(round = round, selected = selected.len(); "configured evaluate");

        self.phase = RoundPhase::AwaitingEvaluateResults;
        let params = Arc::clone(&self.parameters);
        let (evaluate_results, evaluate_failures) =
            scatter_gather(selected, self.config.round_timeout, &self.cancel, |client| {
                let params = Arc::clone(&params);
                let config = round_config.clone();
                async move { client.evaluate(params, config).await }
            })
            .await
            .map_err(|_| FedError::Cancelled { round })?;

        failures.extend(evaluate_failures);

        if evaluate_results.is_empty() {
            return Err(FedError::RoundFailure {
                round,
                phase: Phase::Evaluate,
            });
        }

        self.phase = RoundPhase::AggregatingEvaluate;
        let (loss, metrics) = self.aggregator.aggregate_evaluate(&evaluate_results)?;

        let record = RoundRecord {
            round,
            loss,
            metrics,
            fit_metrics,
            fit_participants: fit_results.into_iter().map(|(p, _)| p.id).collect(),
            evaluate_participants: evaluate_results.iter().map(|(p, _)| p.id.clone()).collect(),
            evaluations: evaluate_results
                .into_iter()
                .map(|(p, r)| ParticipantEvaluation {
                    participant: p.id,
                    loss: r.loss,
                    accuracy: r.accuracy(),
                })
                .collect(),
            failures,
        };

        info!(
            round = round,
            loss = record.loss,
            accuracy = record.accuracy().unwrap_or(f64::NAN),
            failures = record.failures.len();
            "round completed"
        );

        if let Some(log) = &self.log {
            log.append(&record);
        }

        self.history.push(record);
        Ok(())
    }

    /// Samples participants for a phase and pairs them with their clients.
    fn select(
        &mut self,
        round: usize,
        total_rounds: usize,
        count: usize,
        phase: Phase,
    ) -> Result<Vec<(Participant, Arc<dyn ParticipantClient>)>> {
        let policy = match phase {
            Phase::Fit => self.fit_policy.as_deref(),
            Phase::Evaluate => self.evaluate_policy.as_deref(),
        };

        let ctx = SelectionContext::new(round, total_rounds, &self.performance);
        let min_count = self.config.sampling.min_available_clients;
        let selected = self.registry.sample(count, min_count, policy, &ctx)?;

        selected
            .into_iter()
            .map(|participant| {
                let client = self
                    .clients
                    .get(&participant.id)
                    .cloned()
                    .ok_or_else(|| FedError::UnknownParticipant(participant.id.clone()))?;
                Ok((participant, client))
            })
            .collect()
    }
}
