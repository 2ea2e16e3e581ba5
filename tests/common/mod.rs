#![allow(dead_code)]

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use async_trait::async_trait;
use fed_orchestra::{
    EvaluateResult, FedError, FitResult, Metrics, Orchestrator, OrchestratorConfig,
    ParameterSet, ParticipantClient, ParticipantId, Result, RoundConfig,
    aggregation::FedAvg,
    orchestration::SamplingConfig,
    results::{ACCURACY, LOSS},
};
use ndarray::{ArrayD, IxDyn};

/// What a scripted participant does when asked for something.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    Succeed,
    Fail,
    Hang,
    Panic,
    WrongShape,
}

/// A participant that answers following a fixed script.
pub struct Scripted {
    id: ParticipantId,
    value: f32,
    samples: usize,
    accuracy: f64,
    fit: Behaviour,
    evaluate: Behaviour,
    /// Rounds from this one on hang forever.
    hang_from: Option<usize>,
}

impl Scripted {
    pub fn new(id: usize, value: f32, samples: usize) -> Self {
        Self {
            id: ParticipantId::from(id),
            value,
            samples,
            accuracy: 0.5,
            fit: Behaviour::Succeed,
            evaluate: Behaviour::Succeed,
            hang_from: None,
        }
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn on_fit(mut self, behaviour: Behaviour) -> Self {
        self.fit = behaviour;
        self
    }

    pub fn on_evaluate(mut self, behaviour: Behaviour) -> Self {
        self.evaluate = behaviour;
        self
    }

    pub fn hang_from(mut self, round: usize) -> Self {
        self.hang_from = Some(round);
        self
    }

    async fn act(&self, behaviour: Behaviour, round: usize) -> Result<()> {
        let behaviour = match self.hang_from {
            Some(from) if round >= from => Behaviour::Hang,
            _ => behaviour,
        };

        match behaviour {
            Behaviour::Succeed | Behaviour::WrongShape => Ok(()),
            Behaviour::Fail => Err(FedError::InvalidResult(format!("{} refused", self.id))),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(())
            }
            Behaviour::Panic => panic!("participant {} crashed", self.id),
        }
    }
}

#[async_trait]
impl ParticipantClient for Scripted {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    async fn fit(&self, params: Arc<ParameterSet>, config: RoundConfig) -> Result<FitResult> {
        self.act(self.fit, config.round).await?;

        let parameters = if self.fit == Behaviour::WrongShape {
            ParameterSet::new(vec![ArrayD::from_elem(IxDyn(&[7]), self.value)])
        } else {
            filled(&params, self.value)
        };

        let metrics = Metrics::from([
            (ACCURACY.to_string(), self.accuracy),
            (LOSS.to_string(), 1. - self.accuracy),
        ]);
        let samples = NonZeroUsize::new(self.samples).unwrap();
        Ok(FitResult::new(parameters, samples, metrics))
    }

    async fn evaluate(&self, _params: Arc<ParameterSet>, config: RoundConfig) -> Result<EvaluateResult> {
        self.act(self.evaluate, config.round).await?;

        let metrics = Metrics::from([(ACCURACY.to_string(), self.accuracy)]);
        let samples = NonZeroUsize::new(self.samples).unwrap();
        Ok(EvaluateResult::new(1. - self.accuracy, samples, metrics))
    }
}

/// A copy of `params` with every scalar set to `value`.
pub fn filled(params: &ParameterSet, value: f32) -> ParameterSet {
    ParameterSet::new(
        params
            .iter()
            .map(|array| ArrayD::from_elem(array.raw_dim(), value))
            .collect(),
    )
}

pub fn initial_parameters() -> ParameterSet {
    ParameterSet::new(vec![
        ArrayD::zeros(IxDyn(&[2, 3])),
        ArrayD::zeros(IxDyn(&[3])),
    ])
}

/// Every available participant trains and evaluates every round.
pub fn everyone(participants: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        sampling: SamplingConfig {
            clients_per_round: Some(participants),
            fraction_evaluate: 1.,
            min_fit_clients: 1,
            min_evaluate_clients: 1,
            min_available_clients: 1,
            ..Default::default()
        },
        seed: Some(7),
        ..Default::default()
    }
}

pub fn orchestrator(config: OrchestratorConfig, participants: Vec<Scripted>) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(initial_parameters(), Box::new(FedAvg::new()), config);
    for participant in participants {
        let client: Arc<dyn ParticipantClient> = Arc::new(participant);
        orchestrator.add_participant(client);
    }
    orchestrator
}
