use rand::{Rng, seq::SliceRandom};

use crate::{error::Result, history::PerformanceStore, participants::Participant};

/// Everything a selection policy may look at besides the candidates themselves.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub round: usize,
    pub total_rounds: usize,
    pub history: &'a PerformanceStore,
}

impl<'a> SelectionContext<'a> {
    pub fn new(round: usize, total_rounds: usize, history: &'a PerformanceStore) -> Self {
        Self {
            round,
            total_rounds,
            history,
        }
    }

    /// The fraction of the run already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_rounds == 0 {
            return 0.0;
        }

        (self.round as f64 / self.total_rounds as f64).clamp(0., 1.)
    }
}

/// Chooses which participants take part in a round.
///
/// Implementations keep no state between calls other than what they read through
/// the context's `PerformanceStore` (and their own random source).
pub trait SelectionPolicy: Send + Sync {
    /// A short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Selects `n` distinct participants among `candidates`.
    ///
    /// # Arguments
    /// * `ctx` - The current round and the performance history.
    /// * `candidates` - The available participants, in registration order.
    /// * `n` - The amount of participants to select.
    ///
    /// # Returns
    /// The selected participants or `InsufficientParticipants` if there are fewer
    /// than `n` candidates.
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: &[Participant],
        n: usize,
    ) -> Result<Vec<Participant>>;
}

/// Picks `n` candidates uniformly at random without replacement.
pub fn uniform_sample<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[Participant],
    n: usize,
) -> Vec<Participant> {
    let mut chosen = candidates.to_vec();
    chosen.shuffle(rng);
    chosen.truncate(n);
    chosen
}

/// Ranks candidate indices by descending score, ties keep the candidates' order.
pub(super) fn rank_by_score(scores: &[f64], indices: &mut [usize]) {
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
}
