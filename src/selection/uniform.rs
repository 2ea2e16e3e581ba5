use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};

use super::{SelectionContext, SelectionPolicy, policy::uniform_sample};
use crate::{
    error::{FedError, Result},
    participants::Participant,
};

/// Uniform random selection without replacement, the plain FedAvg behaviour.
#[derive(Debug)]
pub struct UniformSelection {
    rng: Mutex<StdRng>,
}

impl UniformSelection {
    /// Creates a new `UniformSelection`.
    ///
    /// # Arguments
    /// * `seed` - The seed of the random source, `None` seeds from the os.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl SelectionPolicy for UniformSelection {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Participant],
        n: usize,
    ) -> Result<Vec<Participant>> {
        if candidates.len() < n {
            return Err(FedError::InsufficientParticipants {
                available: candidates.len(),
                required: n,
            });
        }

        Ok(uniform_sample(&mut *self.rng.lock(), candidates, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PerformanceStore;

    #[test]
    fn same_seed_same_selection() {
        let candidates: Vec<_> = (0..10).map(Participant::new).collect();
        let history = PerformanceStore::default();
        let ctx = SelectionContext::new(1, 5, &history);

        let a = UniformSelection::new(Some(3)).select(&ctx, &candidates, 4).unwrap();
        let b = UniformSelection::new(Some(3)).select(&ctx, &candidates, 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn too_few_candidates() {
        let candidates: Vec<_> = (0..2).map(Participant::new).collect();
        let history = PerformanceStore::default();
        let ctx = SelectionContext::new(1, 5, &history);

        let err = UniformSelection::new(Some(3))
            .select(&ctx, &candidates, 3)
            .unwrap_err();
        assert!(matches!(err, FedError::InsufficientParticipants { .. }));
    }
}
