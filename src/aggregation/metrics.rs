use std::sync::Arc;

use crate::{
    participants::Participant,
    results::{ACCURACY, EvaluateResult, FitResult, Metrics},
};

/// Turns a round's fit results into the aggregated fit metrics.
pub type FitMetricsFn = Arc<dyn Fn(&[(Participant, FitResult)]) -> Metrics + Send + Sync>;

/// Turns a round's evaluate results into the aggregated evaluate metrics.
pub type EvaluateMetricsFn = Arc<dyn Fn(&[(Participant, EvaluateResult)]) -> Metrics + Send + Sync>;

/// Sample count weighted mean of `key`, only if every item reports it.
pub(super) fn weighted_metric<'a, I>(items: I, key: &str) -> Option<f64>
where
    I: IntoIterator<Item = (&'a Metrics, f64)>,
{
    let mut sum = 0.;
    let mut total = 0.;

    for (metrics, weight) in items {
        sum += metrics.get(key)? * weight;
        total += weight;
    }

    (total > 0.).then(|| sum / total)
}

/// Plain mean of the reported accuracies, ignoring results that don't report one.
pub fn mean_accuracy(results: &[(Participant, EvaluateResult)]) -> Metrics {
    let accuracies: Vec<_> = results.iter().filter_map(|(_, r)| r.accuracy()).collect();

    let mut metrics = Metrics::new();
    if !accuracies.is_empty() {
        let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        metrics.insert(ACCURACY.to_string(), mean);
    }

    metrics
}

/// Sample count weighted mean of every metric reported by all fit results.
pub fn weighted_fit_metrics(results: &[(Participant, FitResult)]) -> Metrics {
    let Some((_, first)) = results.first() else {
        return Metrics::new();
    };

    first
        .metrics
        .keys()
        .filter_map(|key| {
            let items = results
                .iter()
                .map(|(_, r)| (&r.metrics, r.sample_count.get() as f64));
            weighted_metric(items, key).map(|value| (key.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{parameters::ParameterSet, results::LOSS};

    fn eval(id: usize, samples: usize, accuracy: Option<f64>) -> (Participant, EvaluateResult) {
        let mut metrics = Metrics::new();
        if let Some(accuracy) = accuracy {
            metrics.insert(ACCURACY.to_string(), accuracy);
        }

        let samples = NonZeroUsize::new(samples).unwrap();
        (Participant::new(id), EvaluateResult::new(0., samples, metrics))
    }

    #[test]
    fn mean_accuracy_is_unweighted() {
        let results = [eval(0, 10, Some(0.5)), eval(1, 90, Some(1.0)), eval(2, 5, None)];
        let metrics = mean_accuracy(&results);
        assert!((metrics[ACCURACY] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn mean_accuracy_without_reports_is_empty() {
        assert!(mean_accuracy(&[eval(0, 10, None)]).is_empty());
    }

    #[test]
    fn fit_metrics_keep_only_common_keys() {
        let fit = |id: usize, samples: usize, pairs: &[(&str, f64)]| {
            let metrics = pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect();
            let samples = NonZeroUsize::new(samples).unwrap();
            let result = FitResult::new(ParameterSet::default(), samples, metrics);
            (Participant::new(id), result)
        };

        let results = [
            fit(0, 10, &[(LOSS, 1.0), (ACCURACY, 0.2)]),
            fit(1, 30, &[(LOSS, 3.0)]),
        ];
        let metrics = weighted_fit_metrics(&results);

        assert_eq!(metrics.len(), 1);
        assert!((metrics[LOSS] - 2.5).abs() < 1e-12);
    }
}
