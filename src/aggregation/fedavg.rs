use log::debug;
use ndarray::ArrayD;
use rayon::prelude::*;

use super::{
    Aggregator,
    metrics::{EvaluateMetricsFn, FitMetricsFn, weighted_metric},
};
use crate::{
    error::{FedError, Result},
    parameters::ParameterSet,
    participants::Participant,
    results::{ACCURACY, EvaluateResult, FitResult, Metrics},
};

/// Federated averaging, every contribution weighs as much as the samples behind it.
#[derive(Default, Clone)]
pub struct FedAvg {
    fit_metrics_fn: Option<FitMetricsFn>,
    evaluate_metrics_fn: Option<EvaluateMetricsFn>,
}

impl FedAvg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the function producing the aggregated fit metrics, without one they're empty.
    pub fn with_fit_metrics(mut self, f: FitMetricsFn) -> Self {
        self.fit_metrics_fn = Some(f);
        self
    }

    /// Sets the function producing the aggregated evaluate metrics, replacing the
    /// weighted accuracy.
    pub fn with_evaluate_metrics(mut self, f: EvaluateMetricsFn) -> Self {
        self.evaluate_metrics_fn = Some(f);
        self
    }
}

/// Computes the weighted mean of compatible parameter sets.
///
/// Accumulation happens in `f64`, one array per rayon task.
///
/// # Arguments
/// * `inputs` - The parameter sets with their weights, at least one.
///
/// # Returns
/// The averaged parameter set or a `ShapeMismatch` if any two inputs are incompatible.
pub fn weighted_mean(inputs: &[(&ParameterSet, f64)]) -> Result<ParameterSet> {
    let Some(&(first, _)) = inputs.first() else {
        return Err(FedError::EmptyAggregation);
    };

    for (params, _) in &inputs[1..] {
        first.ensure_compatible(params)?;
    }

    let total: f64 = inputs.iter().map(|(_, w)| w).sum();
    if total <= 0. || !total.is_finite() {
        return Err(FedError::InvalidResult(format!(
            "aggregation weights must add up to a positive value, got {total}"
        )));
    }

    let arrays: Vec<_> = (0..first.len())
        .into_par_iter()
        .map(|i| {
            let mut acc = ArrayD::<f64>::zeros(first.arrays()[i].raw_dim());

            for &(params, weight) in inputs {
                acc.zip_mut_with(&params.arrays()[i], |a, &x| *a += weight * x as f64);
            }

            acc.mapv(|a| (a / total) as f32)
        })
        .collect();

    Ok(ParameterSet::new(arrays))
}

impl Aggregator for FedAvg {
    fn aggregate_fit(&self, results: &[(Participant, FitResult)]) -> Result<(ParameterSet, Metrics)> {
        if results.is_empty() {
            return Err(FedError::EmptyAggregation);
        }

        let inputs: Vec<_> = results
            .iter()
            .map(|(_, r)| (&r.parameters, r.sample_count.get() as f64))
            .collect();

        let params = weighted_mean(&inputs)?;
        let metrics = match &self.fit_metrics_fn {
            Some(f) => f(results),
            None => Metrics::new(),
        };

        debug!(contributors = results.len(), scalars = params.num_scalars(); "aggregated fit");
        Ok((params, metrics))
    }

    fn aggregate_evaluate(&self, results: &[(Participant, EvaluateResult)]) -> Result<(f64, Metrics)> {
        if results.is_empty() {
            return Err(FedError::EmptyAggregation);
        }

        let total: f64 = results.iter().map(|(_, r)| r.sample_count.get() as f64).sum();
        let loss = results
            .iter()
            .map(|(_, r)| r.loss * r.sample_count.get() as f64)
            .sum::<f64>()
            / total;

        let metrics = match &self.evaluate_metrics_fn {
            Some(f) => f(results),
            None => {
                let items = results
                    .iter()
                    .map(|(_, r)| (&r.metrics, r.sample_count.get() as f64));

                weighted_metric(items, ACCURACY)
                    .map(|accuracy| Metrics::from([(ACCURACY.to_string(), accuracy)]))
                    .unwrap_or_default()
            }
        };

        Ok((loss, metrics))
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use ndarray::{ArrayD, IxDyn, arr1, arr2};

    use super::*;
    use crate::aggregation::mean_accuracy;

    fn params(values: &[f32]) -> ParameterSet {
        ParameterSet::new(vec![
            arr1(values).into_dyn(),
            arr2(&[[values[0], values[0] * 2.]]).into_dyn(),
        ])
    }

    fn fit(id: usize, samples: usize, values: &[f32]) -> (Participant, FitResult) {
        let samples = NonZeroUsize::new(samples).unwrap();
        let result = FitResult::new(params(values), samples, Metrics::new());
        (Participant::new(id), result)
    }

    fn eval(id: usize, samples: usize, loss: f64, accuracy: Option<f64>) -> (Participant, EvaluateResult) {
        let metrics = accuracy
            .map(|a| Metrics::from([(ACCURACY.to_string(), a)]))
            .unwrap_or_default();
        let samples = NonZeroUsize::new(samples).unwrap();
        (Participant::new(id), EvaluateResult::new(loss, samples, metrics))
    }

    #[test]
    fn sample_count_weighting() {
        let results = [fit(0, 10, &[1.]), fit(1, 20, &[2.]), fit(2, 30, &[3.])];
        let (params, metrics) = FedAvg::new().aggregate_fit(&results).unwrap();

        let expected = 140. / 60.;
        assert!((params.arrays()[0][[0]] as f64 - expected).abs() < 1e-5);
        assert!(metrics.is_empty());
    }

    #[test]
    fn single_contributor_is_identity() {
        let results = [fit(0, 7, &[0.25, -3.5, 1e-3])];
        let (params, _) = FedAvg::new().aggregate_fit(&results).unwrap();
        assert_eq!(params, results[0].1.parameters);
    }

    #[test]
    fn output_stays_within_convex_hull() {
        let inputs = [
            [0.1, -4., 9., 2.5],
            [0.7, 3., -1., 2.5],
            [-0.2, 0., 4., 2.5],
            [0.3, 1., 1., 2.5],
        ];
        let results: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(i, values)| fit(i, i * 13 + 1, values))
            .collect();

        let (params, _) = FedAvg::new().aggregate_fit(&results).unwrap();

        for (array_idx, array) in params.arrays().iter().enumerate() {
            for (idx, &value) in array.indexed_iter() {
                let column = results
                    .iter()
                    .map(|(_, r)| r.parameters.arrays()[array_idx][&idx]);
                let lo = column.clone().fold(f32::INFINITY, f32::min);
                let hi = column.fold(f32::NEG_INFINITY, f32::max);
                assert!(value >= lo - 1e-6 && value <= hi + 1e-6);
            }
        }
    }

    #[test]
    fn incompatible_inputs_are_rejected() {
        let mut other = fit(1, 10, &[1., 2.]);
        other.1.parameters = ParameterSet::new(vec![ArrayD::zeros(IxDyn(&[3]))]);

        let err = FedAvg::new()
            .aggregate_fit(&[fit(0, 10, &[1., 2.]), other])
            .unwrap_err();
        assert!(matches!(err, FedError::ShapeMismatch { .. }));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            FedAvg::new().aggregate_fit(&[]),
            Err(FedError::EmptyAggregation)
        ));
        assert!(matches!(
            FedAvg::new().aggregate_evaluate(&[]),
            Err(FedError::EmptyAggregation)
        ));
    }

    #[test]
    fn fit_metrics_function_is_used() {
        let aggregator = FedAvg::new().with_fit_metrics(Arc::new(|results: &[(Participant, FitResult)]| {
            Metrics::from([("contributors".to_string(), results.len() as f64)])
        }));

        let (_, metrics) = aggregator
            .aggregate_fit(&[fit(0, 1, &[1.]), fit(1, 1, &[1.])])
            .unwrap();
        assert_eq!(metrics["contributors"], 2.);
    }

    #[test]
    fn evaluate_weights_loss_and_accuracy() {
        let results = [eval(0, 10, 1., Some(0.1)), eval(1, 30, 3., Some(0.5))];
        let (loss, metrics) = FedAvg::new().aggregate_evaluate(&results).unwrap();

        assert!((loss - 2.5).abs() < 1e-12);
        assert!((metrics[ACCURACY] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn missing_accuracy_is_omitted() {
        let results = [eval(0, 10, 1., Some(0.1)), eval(1, 30, 3., None)];
        let (loss, metrics) = FedAvg::new().aggregate_evaluate(&results).unwrap();

        assert!((loss - 2.5).abs() < 1e-12);
        assert!(!metrics.contains_key(ACCURACY));
    }

    #[test]
    fn evaluate_metrics_function_replaces_default() {
        let aggregator = FedAvg::new().with_evaluate_metrics(Arc::new(mean_accuracy));
        let results = [eval(0, 10, 1., Some(0.1)), eval(1, 30, 3., Some(0.5))];
        let (_, metrics) = aggregator.aggregate_evaluate(&results).unwrap();

        assert!((metrics[ACCURACY] - 0.3).abs() < 1e-12);
    }
}
