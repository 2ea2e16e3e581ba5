use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};

use crate::error::{FedError, Result};

/// A labelled classification dataset held in memory, one sample per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Array1<usize>,
    num_classes: usize,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `features` - The samples, one per row.
    /// * `labels` - The class of every sample.
    /// * `num_classes` - The amount of classes, every label must be below it.
    ///
    /// # Returns
    /// A new `Dataset` or an `InvalidConfig` error if rows and labels disagree.
    pub fn new(features: Array2<f32>, labels: Array1<usize>, num_classes: usize) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(FedError::InvalidConfig(format!(
                "dataset has {} rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        if let Some(&label) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(FedError::InvalidConfig(format!(
                "label {label} out of range for {num_classes} classes"
            )));
        }

        Ok(Self {
            features,
            labels,
            num_classes,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    /// Builds a new dataset out of the samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            num_classes: self.num_classes,
        }
    }

    /// Splits off the last `test_fraction` of the samples as a test set.
    ///
    /// Both halves keep at least one sample whenever the dataset has two or more.
    ///
    /// # Returns
    /// The `(train, test)` pair.
    pub fn train_test_split(&self, test_fraction: f64) -> (Self, Self) {
        let len = self.len();
        let mut n_test = (len as f64 * test_fraction).round() as usize;
        if len >= 2 {
            n_test = n_test.clamp(1, len - 1);
        }
        let n_train = len - n_test.min(len);

        let train = Self {
            features: self.features.slice(s![..n_train, ..]).to_owned(),
            labels: self.labels.slice(s![..n_train]).to_owned(),
            num_classes: self.num_classes,
        };
        let test = Self {
            features: self.features.slice(s![n_train.., ..]).to_owned(),
            labels: self.labels.slice(s![n_train..]).to_owned(),
            num_classes: self.num_classes,
        };

        (train, test)
    }

    /// Iterates over consecutive mini batches of at most `batch_size` samples.
    pub fn batches(
        &self,
        batch_size: usize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView1<'_, usize>)> {
        let batch_size = batch_size.max(1);

        self.features
            .axis_chunks_iter(Axis(0), batch_size)
            .zip(self.labels.axis_chunks_iter(Axis(0), batch_size))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    fn dataset() -> Dataset {
        let features = arr2(&[[0., 0.], [1., 1.], [2., 2.], [3., 3.], [4., 4.]]);
        Dataset::new(features, arr1(&[0, 1, 0, 1, 0]), 2).unwrap()
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let err = Dataset::new(arr2(&[[0.]]), arr1(&[3]), 2).unwrap_err();
        assert!(matches!(err, FedError::InvalidConfig(_)));
    }

    #[test]
    fn split_keeps_both_halves_non_empty() {
        let (train, test) = dataset().train_test_split(0.2);
        assert_eq!((train.len(), test.len()), (4, 1));

        let (train, test) = dataset().train_test_split(0.01);
        assert_eq!((train.len(), test.len()), (4, 1));
        assert_eq!(test.features()[[0, 0]], 4.);
    }

    #[test]
    fn batches_cover_every_sample() {
        let dataset = dataset();
        let sizes: Vec<_> = dataset.batches(2).map(|(x, y)| (x.nrows(), y.len())).collect();
        assert_eq!(sizes, [(2, 2), (2, 2), (1, 1)]);
    }

    #[test]
    fn select_reorders() {
        let subset = dataset().select(&[4, 1]);
        assert_eq!(subset.labels().to_vec(), [0, 1]);
        assert_eq!(subset.features()[[0, 0]], 4.);
    }
}
