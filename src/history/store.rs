use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    num::NonZeroUsize,
};

use crate::participants::ParticipantId;

/// Default amount of scores kept per participant.
pub const DEFAULT_PERFORMANCE_WINDOW: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// Recent performance of a single participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceRecord {
    scores: VecDeque<f64>,
    usage: u64,
}

impl PerformanceRecord {
    /// The retained scores, oldest first.
    pub fn scores(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.scores.iter().copied()
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    /// Weighted mean of the window, weights grow linearly from 0.5 (oldest) to 1.0 (newest).
    ///
    /// # Returns
    /// The weighted mean, or 0.0 for an empty window.
    pub fn weighted_average(&self) -> f64 {
        let n = self.scores.len();
        if n == 0 {
            return 0.0;
        }

        let step = if n > 1 { 0.5 / (n - 1) as f64 } else { 0.0 };
        let (sum, total) = self
            .scores
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, total), (i, &score)| {
                let weight = 0.5 + step * i as f64;
                (sum + weight * score, total + weight)
            });

        sum / total
    }
}

/// Per participant rolling window of recent scores and usage counters.
///
/// Records are created lazily on first contribution and live as long as the store.
#[derive(Debug, Clone)]
pub struct PerformanceStore {
    window: NonZeroUsize,
    records: HashMap<ParticipantId, PerformanceRecord>,
}

impl Default for PerformanceStore {
    fn default() -> Self {
        Self::new(DEFAULT_PERFORMANCE_WINDOW)
    }
}

impl PerformanceStore {
    /// Creates a new `PerformanceStore`.
    ///
    /// # Arguments
    /// * `window` - The maximum amount of scores kept per participant.
    ///
    /// # Returns
    /// A new `PerformanceStore` instance.
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            records: HashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window.get()
    }

    /// Appends a score to the participant's window and bumps its usage counter.
    ///
    /// # Arguments
    /// * `id` - The contributing participant.
    /// * `score` - The derived performance score.
    pub fn record(&mut self, id: &ParticipantId, score: f64) {
        let record = self.records.entry(id.clone()).or_default();

        record.scores.push_back(score);
        while record.scores.len() > self.window.get() {
            record.scores.pop_front();
        }

        record.usage += 1;
    }

    /// Returns the weighted average of the participant's window, 0.0 if unseen.
    pub fn weighted_average(&self, id: &ParticipantId) -> f64 {
        self.records
            .get(id)
            .map(PerformanceRecord::weighted_average)
            .unwrap_or(0.0)
    }

    /// Returns how many times the participant contributed, 0 if unseen.
    pub fn usage_count(&self, id: &ParticipantId) -> u64 {
        self.records.get(id).map(|r| r.usage).unwrap_or(0)
    }

    pub fn record_of(&self, id: &ParticipantId) -> Option<&PerformanceRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted snapshot of every usage counter, for reporting.
    pub fn usage_snapshot(&self) -> BTreeMap<ParticipantId, u64> {
        self.records
            .iter()
            .map(|(id, r)| (id.clone(), r.usage))
            .collect()
    }
}
