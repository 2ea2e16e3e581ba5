use crate::{
    data::Dataset,
    error::Result,
    orchestration::RoundConfig,
    parameters::{ParameterSet, WeightCodec},
    results::Metrics,
};

/// A model a participant can train and evaluate on its local data.
pub trait TrainableModel: WeightCodec + Send + 'static {
    /// Returns a copy of the current weights.
    fn get_weights(&self) -> ParameterSet {
        self.encode()
    }

    /// Overwrites the current weights.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if `params` doesn't fit the model.
    fn set_weights(&mut self, params: &ParameterSet) -> Result<()> {
        self.decode(params)
    }

    /// Trains the model on `data` following the round's configuration.
    ///
    /// # Arguments
    /// * `data` - The local training data.
    /// * `config` - The round's training parameters.
    ///
    /// # Returns
    /// The training metrics.
    fn fit(&mut self, data: &Dataset, config: &RoundConfig) -> Result<Metrics>;

    /// Evaluates the model on `data`.
    ///
    /// # Returns
    /// The loss and the evaluation metrics.
    fn evaluate(&self, data: &Dataset) -> Result<(f64, Metrics)>;
}
