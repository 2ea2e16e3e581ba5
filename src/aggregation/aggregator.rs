use crate::{
    error::Result,
    parameters::ParameterSet,
    participants::Participant,
    results::{EvaluateResult, FitResult, Metrics},
};

/// Combines the results of a round's participants into a single global update.
pub trait Aggregator: Send + Sync {
    /// Aggregates the fit results of a round.
    ///
    /// # Arguments
    /// * `results` - The successful fit results, at least one.
    ///
    /// # Returns
    /// The new global parameters and the aggregated fit metrics.
    fn aggregate_fit(&self, results: &[(Participant, FitResult)]) -> Result<(ParameterSet, Metrics)>;

    /// Aggregates the evaluate results of a round.
    ///
    /// # Arguments
    /// * `results` - The successful evaluate results, at least one.
    ///
    /// # Returns
    /// The aggregated loss and metrics.
    fn aggregate_evaluate(&self, results: &[(Participant, EvaluateResult)]) -> Result<(f64, Metrics)>;
}
