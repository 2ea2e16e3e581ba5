use crate::results::{ACCURACY, LOSS, Metrics};

/// Maximum relative boost granted to contributions from late rounds.
const RECENCY_WEIGHT: f64 = 0.01;

/// Derives a participant's performance score from the metrics of its fit result.
///
/// Accuracy is discounted by `1 / (1 + loss)` when both are present, either one alone
/// stands in for the score and a neutral 1.0 is used when neither is reported. Late
/// rounds get a small multiplicative recency bonus.
///
/// # Arguments
/// * `metrics` - The metrics reported alongside the fit result.
/// * `round` - The current round, starting at 1.
/// * `total_rounds` - The amount of configured rounds.
///
/// # Returns
/// The derived score.
pub fn derive_score(metrics: &Metrics, round: usize, total_rounds: usize) -> f64 {
    let accuracy = metrics.get(ACCURACY).copied();
    let loss = metrics.get(LOSS).copied();

    let score = match (accuracy, loss) {
        (Some(accuracy), Some(loss)) => accuracy * (1.0 / (1.0 + loss)),
        (Some(accuracy), None) => accuracy,
        (None, Some(loss)) => 1.0 / (1.0 + loss),
        (None, None) => 1.0,
    };

    let progress = if total_rounds == 0 {
        0.0
    } else {
        round as f64 / total_rounds as f64
    };

    score * (1.0 + RECENCY_WEIGHT * progress)
}
