use std::{io, num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::task;
use tokio_util::sync::CancellationToken;

use super::ParticipantClient;
use crate::{
    data::{Dataset, DatasetProvider},
    error::{FedError, Result},
    model::TrainableModel,
    orchestration::RoundConfig,
    parameters::ParameterSet,
    participants::ParticipantId,
    results::{EvaluateResult, FitResult},
};

/// An in process participant training its own model copy on a partition of a shared
/// `DatasetProvider`.
///
/// Training and evaluation run on tokio's blocking pool. Parameters travel both ways as
/// `ParameterSet::to_bytes` frames, the same bytes a remote transport would carry.
///
/// A blocking job can't be interrupted once it started. When the coordinator drops a
/// request (a timeout or a cancelled run), a job still queued on the model lock is
/// skipped, but one that already started runs to completion and delays the
/// participant's next request.
pub struct LocalParticipant<M: TrainableModel> {
    id: ParticipantId,
    partition: usize,
    provider: Arc<DatasetProvider>,
    model: Arc<Mutex<M>>,
    dropout: f64,
    rng: Mutex<StdRng>,
}

impl<M: TrainableModel> LocalParticipant<M> {
    /// Creates a new `LocalParticipant`.
    ///
    /// # Arguments
    /// * `id` - The participant's identifier.
    /// * `partition` - The index of its partition within `provider`.
    /// * `provider` - The shared data provider.
    /// * `model` - The participant's model, its weights get overwritten every round.
    pub fn new(
        id: impl Into<ParticipantId>,
        partition: usize,
        provider: Arc<DatasetProvider>,
        model: M,
    ) -> Self {
        Self {
            id: id.into(),
            partition,
            provider,
            model: Arc::new(Mutex::new(model)),
            dropout: 0.,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Makes the participant fail every request with probability `dropout`.
    ///
    /// # Arguments
    /// * `dropout` - The failure probability.
    /// * `seed` - The seed deciding the failures.
    pub fn with_dropout(mut self, dropout: f64, seed: u64) -> Self {
        self.dropout = dropout;
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn drops_out(&self) -> Result<()> {
        if self.dropout > 0. && self.rng.lock().random::<f64>() < self.dropout {
            debug!(participant:% = self.id; "simulated dropout");
            return Err(FedError::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!("participant {} dropped out", self.id),
            )));
        }

        Ok(())
    }

    /// Runs `job` against the participant's model and data on the blocking pool.
    ///
    /// The job is skipped if the request was dropped before it got hold of the model.
    async fn run_blocking<T, F>(&self, round: usize, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut M, &Dataset, &Dataset) -> Result<T> + Send + 'static,
    {
        let model = Arc::clone(&self.model);
        let provider = Arc::clone(&self.provider);
        let partition = self.partition;

        let dropped = CancellationToken::new();
        let _guard = dropped.clone().drop_guard();

        task::spawn_blocking(move || {
            let partition = provider.partition(partition)?;
            let mut model = model.lock();
            if dropped.is_cancelled() {
                return Err(FedError::Cancelled { round });
            }

            job(&mut model, &partition.train, &partition.test)
        })
        .await
        .map_err(|e| {
            warn!(participant:% = self.id; "local task failed: {e}");
            FedError::InvalidResult(format!("local task failed: {e}"))
        })?
    }
}

fn sample_count(data: &Dataset) -> Result<NonZeroUsize> {
    NonZeroUsize::new(data.len()).ok_or_else(|| FedError::InvalidResult("local dataset is empty".into()))
}

#[async_trait]
impl<M: TrainableModel> ParticipantClient for LocalParticipant<M> {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    async fn fit(&self, params: Arc<ParameterSet>, config: RoundConfig) -> Result<FitResult> {
        self.drops_out()?;

        let frame = params.to_bytes();
        let round = config.round;
        let (reply, samples, metrics) = self
            .run_blocking(round, move |model, train, _| {
                model.set_weights(&ParameterSet::from_bytes(&frame)?)?;
                let metrics = model.fit(train, &config)?;
                Ok((model.get_weights().to_bytes(), sample_count(train)?, metrics))
            })
            .await?;

        Ok(FitResult::new(ParameterSet::from_bytes(&reply)?, samples, metrics))
    }

    async fn evaluate(&self, params: Arc<ParameterSet>, config: RoundConfig) -> Result<EvaluateResult> {
        self.drops_out()?;

        let frame = params.to_bytes();
        self.run_blocking(config.round, move |model, _, test| {
            model.set_weights(&ParameterSet::from_bytes(&frame)?)?;
            let (loss, metrics) = model.evaluate(test)?;
            Ok(EvaluateResult::new(loss, sample_count(test)?, metrics))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        data::{BlobsConfig, DataConfig},
        model::SoftmaxRegression,
        results::ACCURACY,
    };

    fn provider() -> Arc<DatasetProvider> {
        let config = DataConfig {
            blobs: BlobsConfig {
                num_samples: 100,
                num_features: 4,
                num_classes: 2,
                ..Default::default()
            },
            ..Default::default()
        };

        Arc::new(DatasetProvider::new(config, 2, 1))
    }

    #[tokio::test]
    async fn fit_reports_its_training_samples() {
        let participant = LocalParticipant::new("a", 0, provider(), SoftmaxRegression::new(4, 2));
        let params = Arc::new(SoftmaxRegression::new(4, 2).get_weights());

        let result = participant.fit(params.clone(), RoundConfig::new(1, 3)).await.unwrap();
        assert_eq!(result.sample_count.get(), 40);
        assert!(result.parameters.is_compatible(&params));
        assert_ne!(result.parameters, *params);
    }

    #[tokio::test]
    async fn evaluate_uses_test_split() {
        let participant = LocalParticipant::new("a", 1, provider(), SoftmaxRegression::new(4, 2));
        let params = Arc::new(SoftmaxRegression::new(4, 2).get_weights());

        let result = participant.evaluate(params, RoundConfig::new(1, 3)).await.unwrap();
        assert_eq!(result.sample_count.get(), 10);
        assert!(result.metrics.contains_key(ACCURACY));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_request_skips_queued_work() {
        let participant = LocalParticipant::new("a", 0, provider(), SoftmaxRegression::new(4, 2));
        let initial = participant.model.lock().get_weights();
        let params = Arc::new(SoftmaxRegression::new(4, 2).get_weights());

        let held = participant.model.lock();
        let fit = participant.fit(params, RoundConfig::new(1, 3));
        assert!(tokio::time::timeout(Duration::from_millis(50), fit).await.is_err());
        drop(held);

        // give the queued job time to take the lock and bail out
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(participant.model.lock().get_weights(), initial);
    }

    #[tokio::test]
    async fn certain_dropout_always_fails() {
        let participant = LocalParticipant::new("a", 0, provider(), SoftmaxRegression::new(4, 2))
            .with_dropout(1., 0);
        let params = Arc::new(SoftmaxRegression::new(4, 2).get_weights());

        let err = participant.fit(params, RoundConfig::new(1, 3)).await.unwrap_err();
        assert!(matches!(err, FedError::Io(_)));
    }

    #[tokio::test]
    async fn incompatible_parameters_fail() {
        let participant = LocalParticipant::new("a", 0, provider(), SoftmaxRegression::new(4, 2));
        let params = Arc::new(SoftmaxRegression::new(3, 2).get_weights());

        let err = participant.fit(params, RoundConfig::new(1, 3)).await.unwrap_err();
        assert!(matches!(err, FedError::ShapeMismatch { .. }));
    }
}
