use std::collections::HashMap;

use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use super::{Participant, ParticipantId};
use crate::{
    error::{FedError, Result},
    selection::{SelectionContext, SelectionPolicy, uniform_sample},
};

/// Keeps track of every known participant and their availability.
///
/// Registration order is preserved, it's the base order every ranking falls back to.
#[derive(Debug)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
    index: HashMap<ParticipantId, usize>,
    rng: StdRng,
}

impl ParticipantRegistry {
    /// Creates a new empty `ParticipantRegistry`.
    ///
    /// # Arguments
    /// * `seed` - Seed for the uniform sampling fallback, `None` seeds from the os.
    ///
    /// # Returns
    /// A new `ParticipantRegistry` instance.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            participants: Vec::new(),
            index: HashMap::new(),
            rng,
        }
    }

    /// Registers a participant.
    ///
    /// Registering an already known identifier only updates its availability.
    ///
    /// # Arguments
    /// * `participant` - The participant to register.
    ///
    /// # Returns
    /// Whether the participant was not known before.
    pub fn register(&mut self, participant: Participant) -> bool {
        if let Some(&i) = self.index.get(&participant.id) {
            self.participants[i].available = participant.available;
            return false;
        }

        debug!(participant:% = participant.id; "registered participant");
        self.index
            .insert(participant.id.clone(), self.participants.len());
        self.participants.push(participant);
        true
    }

    /// Changes the availability of a known participant.
    ///
    /// # Arguments
    /// * `id` - The participant's identifier.
    /// * `available` - The new availability.
    ///
    /// # Returns
    /// An `UnknownParticipant` error if `id` was never registered.
    pub fn set_available(&mut self, id: &ParticipantId, available: bool) -> Result<()> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| FedError::UnknownParticipant(id.clone()))?;

        self.participants[i].available = available;
        Ok(())
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.index.get(id).map(|&i| &self.participants[i])
    }

    /// Returns every registered participant in registration order.
    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Returns the participants currently eligible for sampling, in registration order.
    pub fn available(&self) -> Vec<Participant> {
        self.participants
            .iter()
            .filter(|p| p.available)
            .cloned()
            .collect()
    }

    pub fn num_available(&self) -> usize {
        self.participants.iter().filter(|p| p.available).count()
    }

    /// Samples up to `count` distinct available participants.
    ///
    /// # Arguments
    /// * `count` - The desired amount of participants.
    /// * `min_count` - The least amount of available participants required.
    /// * `policy` - The active selection policy, `None` samples uniformly at random.
    /// * `ctx` - The selection context handed to the policy.
    ///
    /// # Returns
    /// The sampled participants or `InsufficientParticipants` if fewer than `min_count`
    /// are available.
    pub fn sample(
        &mut self,
        count: usize,
        min_count: usize,
        policy: Option<&dyn SelectionPolicy>,
        ctx: &SelectionContext<'_>,
    ) -> Result<Vec<Participant>> {
        let candidates = self.available();

        if candidates.len() < min_count {
            return Err(FedError::InsufficientParticipants {
                available: candidates.len(),
                required: min_count,
            });
        }

        let n = count.min(candidates.len());

        match policy {
            Some(policy) => policy.select(ctx, &candidates, n),
            None => Ok(uniform_sample(&mut self.rng, &candidates, n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::history::PerformanceStore;

    fn registry(n: usize) -> ParticipantRegistry {
        let mut registry = ParticipantRegistry::new(Some(7));
        for i in 0..n {
            registry.register(Participant::new(i));
        }
        registry
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = registry(3);
        assert!(!registry.register(Participant::new(1).with_availability(false)));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.num_available(), 2);
        assert!(!registry.get(&ParticipantId::from(1)).unwrap().available);
    }

    #[test]
    fn unknown_participant_availability() {
        let mut registry = registry(1);
        let err = registry
            .set_available(&ParticipantId::from("ghost"), false)
            .unwrap_err();
        assert!(matches!(err, FedError::UnknownParticipant(_)));
    }

    #[test]
    fn uniform_sample_is_distinct_and_bounded() {
        let mut registry = registry(10);
        let history = PerformanceStore::default();
        let ctx = SelectionContext::new(1, 10, &history);

        let sampled = registry.sample(4, 2, None, &ctx).unwrap();
        let ids: HashSet<_> = sampled.iter().map(|p| p.id.clone()).collect();
        assert_eq!(sampled.len(), 4);
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn sample_returns_at_most_what_is_available() {
        let mut registry = registry(5);
        registry.set_available(&ParticipantId::from(0), false).unwrap();
        let history = PerformanceStore::default();
        let ctx = SelectionContext::new(1, 10, &history);

        let sampled = registry.sample(10, 1, None, &ctx).unwrap();
        assert_eq!(sampled.len(), 4);
        assert!(sampled.iter().all(|p| p.id != ParticipantId::from(0)));
    }

    #[test]
    fn sample_fails_below_min_count() {
        let mut registry = registry(3);
        let history = PerformanceStore::default();
        let ctx = SelectionContext::new(1, 10, &history);

        let err = registry.sample(2, 4, None, &ctx).unwrap_err();
        assert!(matches!(
            err,
            FedError::InsufficientParticipants {
                available: 3,
                required: 4
            }
        ));
    }
}
