use serde::{Deserialize, Serialize};

/// How many participants take part in every phase of a round.
///
/// Sizes are `max(floor(available * fraction), min_clients)` unless the fit phase has an
/// explicit `clients_per_round`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub fraction_fit: f64,
    pub fraction_evaluate: f64,
    pub min_fit_clients: usize,
    pub min_evaluate_clients: usize,
    /// Rounds don't start with fewer available participants than this.
    pub min_available_clients: usize,
    /// Overrides the fractional fit sample size.
    pub clients_per_round: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            fraction_fit: 1.0,
            fraction_evaluate: 1.0,
            min_fit_clients: 2,
            min_evaluate_clients: 2,
            min_available_clients: 2,
            clients_per_round: None,
        }
    }
}

impl SamplingConfig {
    /// The amount of participants to train with given `available` ones.
    pub fn num_fit(&self, available: usize) -> usize {
        self.clients_per_round
            .unwrap_or_else(|| fractional(available, self.fraction_fit, self.min_fit_clients))
    }

    /// The amount of participants to evaluate with given `available` ones.
    pub fn num_evaluate(&self, available: usize) -> usize {
        fractional(available, self.fraction_evaluate, self.min_evaluate_clients)
    }
}

fn fractional(available: usize, fraction: f64, min_clients: usize) -> usize {
    ((available as f64 * fraction).floor() as usize).max(min_clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_sizes_respect_minimums() {
        let config = SamplingConfig {
            fraction_fit: 0.6,
            fraction_evaluate: 0.1,
            ..Default::default()
        };

        assert_eq!(config.num_fit(10), 6);
        assert_eq!(config.num_evaluate(10), 2);
    }

    #[test]
    fn explicit_fit_size_wins() {
        let config = SamplingConfig {
            clients_per_round: Some(4),
            ..Default::default()
        };

        assert_eq!(config.num_fit(10), 4);
        assert_eq!(config.num_evaluate(10), 10);
    }
}
