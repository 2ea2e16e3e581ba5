use log::debug;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    SelectionContext, SelectionPolicy,
    policy::{rank_by_score, uniform_sample},
};
use crate::{
    error::{FedError, Result},
    participants::Participant,
};

/// Score based selection that, with a probability decaying over the run, picks the
/// whole round uniformly at random instead.
#[derive(Debug)]
pub struct RandomizedExplorationSelection {
    exploration_prob: f64,
    rng: Mutex<StdRng>,
}

impl RandomizedExplorationSelection {
    /// Creates a new `RandomizedExplorationSelection`.
    ///
    /// # Arguments
    /// * `exploration_prob` - The exploration probability at the start of the run.
    /// * `seed` - The seed of the random source, `None` seeds from the os.
    pub fn new(exploration_prob: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            exploration_prob,
            rng: Mutex::new(rng),
        }
    }

    /// The probability of exploring during the context's round.
    pub fn exploration_probability(&self, ctx: &SelectionContext<'_>) -> f64 {
        let prob = self.exploration_prob * (1. - ctx.progress());
        if prob.is_nan() { 0. } else { prob.clamp(0., 1.) }
    }
}

impl SelectionPolicy for RandomizedExplorationSelection {
    fn name(&self) -> &'static str {
        "randomized_exploration"
    }

    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: &[Participant],
        n: usize,
    ) -> Result<Vec<Participant>> {
        if candidates.len() < n {
            return Err(FedError::InsufficientParticipants {
                available: candidates.len(),
                required: n,
            });
        }

        let prob = self.exploration_probability(ctx);
        let mut rng = self.rng.lock();

        if rng.random::<f64>() < prob {
            debug!(round = ctx.round, prob = prob; "exploring at random");
            return Ok(uniform_sample(&mut *rng, candidates, n));
        }

        let scores: Vec<_> = candidates
            .iter()
            .map(|p| ctx.history.weighted_average(&p.id))
            .collect();

        let mut ranked: Vec<_> = (0..candidates.len()).collect();
        rank_by_score(&scores, &mut ranked);

        Ok(ranked
            .into_iter()
            .take(n)
            .map(|i| candidates[i].clone())
            .collect())
    }
}
