use serde::Serialize;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation, 0.0 with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let Some(mean) = mean(values) else {
        return 0.;
    };

    if values.len() < 2 {
        return 0.;
    }

    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Summary of a set of accuracies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub samples: usize,
}

impl Summary {
    /// Summarizes the finite values of `values`.
    ///
    /// # Returns
    /// The summary, `None` if no value is finite.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mut values: Vec<_> = values.iter().copied().filter(|v| v.is_finite()).collect();
        values.sort_by(f64::total_cmp);

        let mean = mean(&values)?;
        let n = values.len();
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.
        } else {
            values[n / 2]
        };

        Some(Self {
            mean,
            std: sample_std(&values),
            min: values[0],
            max: values[n - 1],
            median,
            samples: n,
        })
    }
}

/// Difference between the final accuracies of two strategies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub baseline: String,
    pub challenger: String,
    /// Challenger mean minus baseline mean.
    pub difference: f64,
    /// `|difference| / sqrt(std_a² + std_b²)`, `None` when both deviations are zero.
    pub z_score: Option<f64>,
}

impl Comparison {
    pub fn new(baseline: (&str, &Summary), challenger: (&str, &Summary)) -> Self {
        let difference = challenger.1.mean - baseline.1.mean;
        let combined = (baseline.1.std.powi(2) + challenger.1.std.powi(2)).sqrt();

        Self {
            baseline: baseline.0.to_string(),
            challenger: challenger.0.to_string(),
            difference,
            z_score: (combined > 0.).then(|| difference.abs() / combined),
        }
    }

    /// Whether the difference exceeds two combined standard deviations.
    pub fn is_significant(&self) -> bool {
        self.z_score.is_some_and(|z| z > 2.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_matches_definition() {
        let std = sample_std(&[2., 4., 4., 4., 5., 5., 7., 9.]);
        assert!((std - 2.138089935).abs() < 1e-9);
        assert_eq!(sample_std(&[3.]), 0.);
        assert_eq!(sample_std(&[]), 0.);
    }

    #[test]
    fn summary_skips_missing_values() {
        let summary = Summary::of(&[0.5, f64::NAN, 0.7, 0.6]).unwrap();
        assert_eq!(summary.samples, 3);
        assert!((summary.mean - 0.6).abs() < 1e-12);
        assert_eq!(summary.median, 0.6);
        assert_eq!((summary.min, summary.max), (0.5, 0.7));
        assert!(Summary::of(&[f64::NAN]).is_none());
    }

    #[test]
    fn z_score_of_separated_strategies() {
        let a = Summary::of(&[0.50, 0.52, 0.48]).unwrap();
        let b = Summary::of(&[0.70, 0.72, 0.68]).unwrap();
        let comparison = Comparison::new(("fedavg", &a), ("performance_based", &b));

        assert!((comparison.difference - 0.2).abs() < 1e-12);
        assert!(comparison.is_significant());
    }

    #[test]
    fn identical_constant_strategies_have_no_z_score() {
        let a = Summary::of(&[0.5, 0.5]).unwrap();
        let comparison = Comparison::new(("a", &a), ("b", &a));
        assert_eq!(comparison.z_score, None);
        assert!(!comparison.is_significant());
    }
}
