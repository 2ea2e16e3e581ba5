use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::Dataset;
use crate::error::{FedError, Result};

/// Parameters of a synthetic Gaussian blobs classification problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobsConfig {
    pub num_samples: usize,
    pub num_features: usize,
    pub num_classes: usize,
    /// Standard deviation of every blob.
    pub cluster_std: f32,
    /// Blob centers are drawn uniformly from `[-center_box, center_box]`.
    pub center_box: f32,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            num_samples: 3000,
            num_features: 16,
            num_classes: 10,
            cluster_std: 2.0,
            center_box: 5.0,
        }
    }
}

/// Generates an isotropic Gaussian blobs dataset, classes are assigned round robin.
///
/// # Arguments
/// * `config` - The shape of the problem.
/// * `seed` - The seed for the centers and the samples.
///
/// # Returns
/// The generated dataset or an `InvalidConfig` error.
pub fn gaussian_blobs(config: &BlobsConfig, seed: u64) -> Result<Dataset> {
    if config.num_classes == 0 || config.num_features == 0 {
        return Err(FedError::InvalidConfig(
            "blobs need at least one class and one feature".into(),
        ));
    }

    if config.center_box.is_nan() || config.center_box <= 0. {
        return Err(FedError::InvalidConfig(format!(
            "center box must be positive, got {}",
            config.center_box
        )));
    }

    let noise = Normal::new(0f32, config.cluster_std)
        .map_err(|e| FedError::InvalidConfig(format!("cluster std: {e}")))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let centers = Array2::from_shape_fn((config.num_classes, config.num_features), |_| {
        rng.random_range(-config.center_box..=config.center_box)
    });

    let labels = Array1::from_shape_fn(config.num_samples, |i| i % config.num_classes);
    let features = Array2::from_shape_fn((config.num_samples, config.num_features), |(i, j)| {
        centers[[labels[i], j]] + noise.sample(&mut rng)
    });

    Dataset::new(features, labels, config.num_classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_the_requested_shape() {
        let config = BlobsConfig {
            num_samples: 100,
            num_features: 3,
            num_classes: 4,
            ..Default::default()
        };

        let dataset = gaussian_blobs(&config, 1).unwrap();
        assert_eq!(dataset.len(), 100);
        assert_eq!(dataset.num_features(), 3);
        assert_eq!(dataset.labels().iter().filter(|&&l| l == 3).count(), 25);
    }

    #[test]
    fn same_seed_same_data() {
        let config = BlobsConfig::default();
        assert_eq!(gaussian_blobs(&config, 5).unwrap(), gaussian_blobs(&config, 5).unwrap());
    }

    #[test]
    fn rejects_negative_spread() {
        let config = BlobsConfig {
            cluster_std: -1.,
            ..Default::default()
        };
        assert!(gaussian_blobs(&config, 0).is_err());
    }
}
