use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Result,
    orchestration::RoundConfig,
    parameters::ParameterSet,
    participants::ParticipantId,
    results::{EvaluateResult, FitResult},
};

/// The coordinator's end of the channel to a single participant.
///
/// Any returned error counts as that participant failing the current phase.
#[async_trait]
pub trait ParticipantClient: Send + Sync {
    /// The identifier of the participant behind this client.
    fn id(&self) -> &ParticipantId;

    /// Asks the participant to train on its local data starting from `params`.
    ///
    /// # Arguments
    /// * `params` - The current global parameters.
    /// * `config` - The round's configuration.
    ///
    /// # Returns
    /// The participant's fit result or an error if it failed.
    async fn fit(&self, params: Arc<ParameterSet>, config: RoundConfig) -> Result<FitResult>;

    /// Asks the participant to evaluate `params` on its local data.
    ///
    /// # Arguments
    /// * `params` - The current global parameters.
    /// * `config` - The round's configuration.
    ///
    /// # Returns
    /// The participant's evaluate result or an error if it failed.
    async fn evaluate(&self, params: Arc<ParameterSet>, config: RoundConfig) -> Result<EvaluateResult>;
}
