use std::fmt;

use ndarray::ArrayD;

use crate::error::{FedError, Result};

/// One full model's weights as an ordered sequence of numeric arrays.
///
/// A `ParameterSet` is never mutated once built, aggregation always produces a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    arrays: Vec<ArrayD<f32>>,
}

impl ParameterSet {
    /// Creates a new `ParameterSet`.
    ///
    /// # Arguments
    /// * `arrays` - The model's arrays, in the model's own layer order.
    ///
    /// # Returns
    /// A new `ParameterSet` instance.
    pub fn new(arrays: Vec<ArrayD<f32>>) -> Self {
        Self { arrays }
    }

    /// Returns the amount of arrays in the set.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Returns the total amount of scalars across every array.
    pub fn num_scalars(&self) -> usize {
        self.arrays.iter().map(|a| a.len()).sum()
    }

    pub fn arrays(&self) -> &[ArrayD<f32>] {
        &self.arrays
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayD<f32>> {
        self.arrays.iter()
    }

    pub fn into_arrays(self) -> Vec<ArrayD<f32>> {
        self.arrays
    }

    /// Returns the shape of every array, in order.
    pub fn shapes(&self) -> Vec<&[usize]> {
        self.arrays.iter().map(|a| a.shape()).collect()
    }

    /// Whether both sets have the same amount of arrays with matching shapes.
    pub fn is_compatible(&self, other: &ParameterSet) -> bool {
        self.len() == other.len()
            && self
                .arrays
                .iter()
                .zip(&other.arrays)
                .all(|(a, b)| a.shape() == b.shape())
    }

    /// Checks compatibility against `other`.
    ///
    /// # Arguments
    /// * `other` - The set to compare against.
    ///
    /// # Returns
    /// A `ShapeMismatch` error describing the first difference found.
    pub fn ensure_compatible(&self, other: &ParameterSet) -> Result<()> {
        if self.len() != other.len() {
            return Err(FedError::shape_mismatch(format!(
                "expected {} arrays, got {}",
                self.len(),
                other.len()
            )));
        }

        for (i, (a, b)) in self.arrays.iter().zip(&other.arrays).enumerate() {
            if a.shape() != b.shape() {
                return Err(FedError::shape_mismatch(format!(
                    "array {i}: expected shape {:?}, got {:?}",
                    a.shape(),
                    b.shape()
                )));
            }
        }

        Ok(())
    }
}

impl From<Vec<ArrayD<f32>>> for ParameterSet {
    fn from(value: Vec<ArrayD<f32>>) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParameterSet({} arrays, {} scalars)",
            self.len(),
            self.num_scalars()
        )
    }
}
