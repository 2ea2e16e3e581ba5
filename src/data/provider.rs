use std::sync::OnceLock;

use log::info;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{BlobsConfig, Dataset, Partitioner, gaussian_blobs};
use crate::error::{FedError, Result};

/// Where the data comes from and how it is spread among participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub blobs: BlobsConfig,
    pub partitioner: Partitioner,
    pub test_fraction: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            blobs: BlobsConfig::default(),
            partitioner: Partitioner::default(),
            test_fraction: 0.2,
        }
    }
}

/// The local data of a single participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub train: Dataset,
    pub test: Dataset,
}

/// Builds the participants' partitions the first time they're requested and hands out
/// the same partitions from then on.
#[derive(Debug)]
pub struct DatasetProvider {
    config: DataConfig,
    num_partitions: usize,
    seed: u64,
    partitions: OnceLock<Vec<Partition>>,
}

impl DatasetProvider {
    /// Creates a new `DatasetProvider`, nothing is generated until first use.
    ///
    /// # Arguments
    /// * `config` - The data source and partitioning.
    /// * `num_partitions` - The amount of participants to serve.
    /// * `seed` - The seed for generation and partitioning.
    pub fn new(config: DataConfig, num_partitions: usize, seed: u64) -> Self {
        Self {
            config,
            num_partitions,
            seed,
            partitions: OnceLock::new(),
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Returns every partition, generating them on the first call.
    pub fn partitions(&self) -> Result<&[Partition]> {
        if let Some(partitions) = self.partitions.get() {
            return Ok(partitions);
        }

        let built = self.build()?;
        Ok(self.partitions.get_or_init(|| built))
    }

    /// Returns the partition of the `index`-th participant.
    pub fn partition(&self, index: usize) -> Result<&Partition> {
        let partitions = self.partitions()?;
        partitions.get(index).ok_or_else(|| {
            FedError::InvalidConfig(format!(
                "partition {index} requested, only {} exist",
                partitions.len()
            ))
        })
    }

    fn build(&self) -> Result<Vec<Partition>> {
        if !(0. ..1.).contains(&self.config.test_fraction) {
            return Err(FedError::InvalidConfig(format!(
                "test fraction must be in [0, 1), got {}",
                self.config.test_fraction
            )));
        }

        let dataset = gaussian_blobs(&self.config.blobs, self.seed)?;
        let labels = dataset.labels().to_vec();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));

        let parts = self.config.partitioner.partition(
            &labels,
            dataset.num_classes(),
            self.num_partitions,
            &mut rng,
        )?;

        info!(
            samples = dataset.len(),
            partitions = parts.len();
            "generated participant partitions"
        );

        Ok(parts
            .iter()
            .map(|indices| {
                let (train, test) = dataset
                    .select(indices)
                    .train_test_split(self.config.test_fraction);
                Partition { train, test }
            })
            .collect())
    }
}
