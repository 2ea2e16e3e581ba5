use log::debug;

use super::{SelectionContext, SelectionPolicy, policy::rank_by_score};
use crate::{
    error::{FedError, Result},
    participants::Participant,
};

/// Deterministic selection that favours well performing participants while reserving
/// a quota of slots for the least used ones.
///
/// A quarter of the slots (at least one) goes to the candidates with the lowest usage
/// count, worst score first. The remaining slots are filled with the best scoring
/// candidates left. Every tie is broken by the candidates' order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceBasedSelection;

impl PerformanceBasedSelection {
    pub fn new() -> Self {
        Self
    }

    /// The amount of slots reserved for exploration when selecting `n` participants.
    pub fn exploration_quota(n: usize) -> usize {
        n.div_ceil(4).max(1)
    }
}

impl SelectionPolicy for PerformanceBasedSelection {
    fn name(&self) -> &'static str {
        "performance_based"
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

        if n == 0 {
            return Ok(Vec::new());
        }

        let scores: Vec<_> = candidates
            .iter()
            .map(|p| ctx.history.weighted_average(&p.id))
            .collect();
        let usages: Vec<_> = candidates
            .iter()
            .map(|p| ctx.history.usage_count(&p.id))
            .collect();

        let n_explore = Self::exploration_quota(n).min(n);
        let min_usage = usages.iter().copied().min().unwrap_or(0);

        let mut least_used: Vec<_> = (0..candidates.len())
            .filter(|&i| usages[i] == min_usage)
            .collect();
        least_used.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
        least_used.truncate(n_explore);

        let mut exploring = vec![false; candidates.len()];
        least_used.iter().for_each(|&i| exploring[i] = true);

        let mut ranked: Vec<_> = (0..candidates.len()).filter(|&i| !exploring[i]).collect();
        rank_by_score(&scores, &mut ranked);
        ranked.truncate(n - least_used.len());

        debug!(
            round = ctx.round,
            exploit = ranked.len(),
            explore = least_used.len();
            "performance based selection"
        );

        Ok(ranked
            .into_iter()
            .chain(least_used)
            .map(|i| candidates[i].clone())
            .collect())
    }
}
