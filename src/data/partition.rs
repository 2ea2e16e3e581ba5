use std::ops::Range;

use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::error::{FedError, Result};

/// Least amount of samples every partition ends up with, one to train and one to test.
pub const MIN_PARTITION_SIZE: usize = 2;

/// How the samples of a dataset are spread among participants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partitioner {
    /// Shuffled and cut into balanced contiguous shards.
    #[default]
    Iid,
    /// Label skewed, every class is spread following a Dirichlet(`alpha`) draw.
    Dirichlet { alpha: f64 },
}

/// Returns the range of the `part`-th of `num_parts` balanced shards over `total` samples.
///
/// Ranges are contiguous, disjoint, cover `[0..total)` and their sizes differ by at most 1.
pub fn shard_range(total: usize, part: usize, num_parts: usize) -> Range<usize> {
    let base = total / num_parts;
    let rem = total % num_parts;

    let start = part * base + part.min(rem);
    let extra = usize::from(part < rem);
    start..start + base + extra
}

impl Partitioner {
    /// Splits the sample indices of a dataset among `num_parts` participants.
    ///
    /// # Arguments
    /// * `labels` - The label of every sample.
    /// * `num_classes` - The amount of classes.
    /// * `num_parts` - The amount of partitions.
    /// * `rng` - The random source.
    ///
    /// # Returns
    /// The indices of every partition, each with at least `MIN_PARTITION_SIZE` samples,
    /// or an `InvalidConfig` error.
    pub fn partition<R: Rng + ?Sized>(
        &self,
        labels: &[usize],
        num_classes: usize,
        num_parts: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<usize>>> {
        if num_parts == 0 {
            return Err(FedError::InvalidConfig("cannot partition into 0 parts".into()));
        }

        if labels.len() < num_parts * MIN_PARTITION_SIZE {
            return Err(FedError::InvalidConfig(format!(
                "{} samples are not enough for {num_parts} partitions",
                labels.len()
            )));
        }

        let mut parts = match *self {
            Self::Iid => iid(labels.len(), num_parts, rng),
            Self::Dirichlet { alpha } => dirichlet(labels, num_classes, num_parts, alpha, rng)?,
        };

        rebalance(&mut parts);
        parts.iter_mut().for_each(|part| part.shuffle(rng));
        Ok(parts)
    }
}

fn iid<R: Rng + ?Sized>(total: usize, num_parts: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut indices: Vec<_> = (0..total).collect();
    indices.shuffle(rng);

    (0..num_parts)
        .map(|part| indices[shard_range(total, part, num_parts)].to_vec())
        .collect()
}

fn dirichlet<R: Rng + ?Sized>(
    labels: &[usize],
    num_classes: usize,
    num_parts: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    let gamma = Gamma::new(alpha, 1.)
        .map_err(|e| FedError::InvalidConfig(format!("dirichlet alpha {alpha}: {e}")))?;

    let mut parts = vec![Vec::new(); num_parts];

    for class in 0..num_classes {
        let mut indices: Vec<_> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        indices.shuffle(rng);

        let draws: Vec<f64> = (0..num_parts).map(|_| gamma.sample(rng)).collect();
        let total: f64 = draws.iter().sum();

        let n = indices.len();
        let mut start = 0;
        let mut cumulative = 0.;

        for (part, draw) in draws.iter().enumerate() {
            cumulative += draw;
            let end = if part + 1 == num_parts {
                n
            } else if total > 0. {
                ((cumulative / total * n as f64).round() as usize).clamp(start, n)
            } else {
                start
            };

            parts[part].extend_from_slice(&indices[start..end]);
            start = end;
        }
    }

    Ok(parts)
}

/// Moves samples from the largest partitions into those below `MIN_PARTITION_SIZE`.
fn rebalance(parts: &mut [Vec<usize>]) {
    loop {
        let Some(small) = parts.iter().position(|p| p.len() < MIN_PARTITION_SIZE) else {
            return;
        };

        let Some(large) = (0..parts.len()).max_by_key(|&i| parts[i].len()) else {
            return;
        };

        if parts[large].len() <= MIN_PARTITION_SIZE {
            return;
        }

        if let Some(sample) = parts[large].pop() {
            parts[small].push(sample);
        }
    }
}
