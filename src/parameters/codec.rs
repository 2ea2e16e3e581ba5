use ndarray::{Array, ArrayD, Dimension, IxDyn};

use super::ParameterSet;
use crate::error::{FedError, Result};

type CountType = u32;
type DimType = u64;
const COUNT_SIZE: usize = size_of::<CountType>();
const DIM_SIZE: usize = size_of::<DimType>();

/// A native parameter layout that can be flattened into a `ParameterSet` and back.
pub trait WeightCodec {
    /// Should copy the native weights into a new `ParameterSet`.
    ///
    /// # Returns
    /// The weights as an ordered sequence of arrays.
    fn encode(&self) -> ParameterSet;

    /// Should overwrite the native weights with the contents of `params`.
    ///
    /// # Arguments
    /// * `params` - The parameters to apply.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if the layout of `params` differs from the native one,
    /// in which case the native weights must be left untouched.
    fn decode(&mut self, params: &ParameterSet) -> Result<()>;
}

/// Checks that `params` carries exactly `expected` arrays with the given shapes.
///
/// # Arguments
/// * `params` - The incoming parameters.
/// * `expected` - The native shapes, in order.
///
/// # Returns
/// A `ShapeMismatch` error on the first difference.
pub fn check_layout(params: &ParameterSet, expected: &[&[usize]]) -> Result<()> {
    if params.len() != expected.len() {
        return Err(FedError::shape_mismatch(format!(
            "model expects {} arrays, got {}",
            expected.len(),
            params.len()
        )));
    }

    for (i, (array, shape)) in params.iter().zip(expected).enumerate() {
        if array.shape() != *shape {
            return Err(FedError::shape_mismatch(format!(
                "array {i}: model expects shape {shape:?}, got {:?}",
                array.shape()
            )));
        }
    }

    Ok(())
}

/// Copies `source` into a statically shaped native array.
///
/// # Arguments
/// * `index` - The position of the array inside its set, for error reporting.
/// * `source` - The dynamically shaped transport array.
/// * `target` - The native array to overwrite.
///
/// # Returns
/// A `ShapeMismatch` error if both shapes differ.
pub fn decode_array<D: Dimension>(
    index: usize,
    source: &ArrayD<f32>,
    target: &mut Array<f32, D>,
) -> Result<()> {
    if source.shape() != target.shape() {
        return Err(FedError::shape_mismatch(format!(
            "array {index}: expected shape {:?}, got {:?}",
            target.shape(),
            source.shape()
        )));
    }

    target.assign(source);
    Ok(())
}

impl ParameterSet {
    /// Serializes the set into a self describing frame.
    ///
    /// The header holds the array count and every array's rank and dimensions as little
    /// endian integers, the payload holds all scalars in row major order.
    ///
    /// # Returns
    /// The encoded frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len: usize = self
            .iter()
            .map(|a| COUNT_SIZE + a.ndim() * DIM_SIZE)
            .sum();

        let mut buf = Vec::with_capacity(COUNT_SIZE + header_len + self.num_scalars() * 4);
        buf.extend_from_slice(&(self.len() as CountType).to_le_bytes());

        for array in self.iter() {
            buf.extend_from_slice(&(array.ndim() as CountType).to_le_bytes());
            for &dim in array.shape() {
                buf.extend_from_slice(&(dim as DimType).to_le_bytes());
            }
        }

        for array in self.iter() {
            match array.as_slice() {
                Some(nums) => buf.extend_from_slice(bytemuck::cast_slice(nums)),
                None => {
                    let nums: Vec<f32> = array.iter().copied().collect();
                    buf.extend_from_slice(bytemuck::cast_slice(&nums));
                }
            }
        }

        buf
    }

    /// Deserializes a frame produced by `to_bytes`.
    ///
    /// # Arguments
    /// * `buf` - The encoded frame.
    ///
    /// # Returns
    /// The decoded set or a `Codec` error if the frame is truncated or inconsistent.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut reader = FrameReader::new(buf);
        let count = reader.read_count()? as usize;

        let mut shapes = Vec::with_capacity(count.min(reader.remaining() / COUNT_SIZE));
        for _ in 0..count {
            let rank = reader.read_count()? as usize;
            let mut dims = Vec::with_capacity(rank.min(reader.remaining() / DIM_SIZE));
            for _ in 0..rank {
                dims.push(reader.read_dim()? as usize);
            }
            shapes.push(dims);
        }

        let mut arrays = Vec::with_capacity(shapes.len());
        for dims in shapes {
            let (len, byte_len) = dims
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .and_then(|len| Some((len, len.checked_mul(size_of::<f32>())?)))
                .ok_or_else(|| FedError::Codec(format!("shape {dims:?} overflows")))?;

            let bytes = reader.take(byte_len)?;
            let mut nums = vec![0f32; len];
            bytemuck::cast_slice_mut::<f32, u8>(&mut nums).copy_from_slice(bytes);

            let array = ArrayD::from_shape_vec(IxDyn(&dims), nums)
                .map_err(|e| FedError::Codec(e.to_string()))?;
            arrays.push(array);
        }

        if !reader.is_exhausted() {
            return Err(FedError::Codec(format!(
                "{} trailing bytes after the last array",
                reader.remaining()
            )));
        }

        Ok(Self::new(arrays))
    }
}

/// Cursor over an encoded frame.
struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                FedError::Codec(format!(
                    "truncated frame: wanted {n} bytes at offset {}, frame is {} bytes",
                    self.pos,
                    self.buf.len()
                ))
            })?;

        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_count(&mut self) -> Result<CountType> {
        let bytes = self.take(COUNT_SIZE)?;
        let mut raw = [0; COUNT_SIZE];
        raw.copy_from_slice(bytes);
        Ok(CountType::from_le_bytes(raw))
    }

    fn read_dim(&mut self) -> Result<DimType> {
        let bytes = self.take(DIM_SIZE)?;
        let mut raw = [0; DIM_SIZE];
        raw.copy_from_slice(bytes);
        Ok(DimType::from_le_bytes(raw))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, array};

    use super::*;

    fn sample_set() -> ParameterSet {
        ParameterSet::new(vec![
            array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn(),
            array![0.5f32, -0.5, 0.25].into_dyn(),
        ])
    }

    #[test]
    fn frame_restores_values_and_shapes() {
        let params = sample_set();
        let decoded = ParameterSet::from_bytes(&params.to_bytes()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn transposed_views_are_written_in_logical_order() {
        let transposed = array![[1.0f32, 2.0], [3.0, 4.0]].reversed_axes().into_dyn();
        let params = ParameterSet::new(vec![transposed.clone()]);
        let decoded = ParameterSet::from_bytes(&params.to_bytes()).unwrap();
        assert_eq!(decoded.arrays()[0], transposed);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = sample_set().to_bytes();
        let err = ParameterSet::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, FedError::Codec(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample_set().to_bytes();
        bytes.push(0);
        assert!(ParameterSet::from_bytes(&bytes).is_err());
    }

    #[test]
    fn check_layout_reports_the_offending_array() {
        let params = sample_set();
        assert!(check_layout(&params, &[&[2, 3], &[3]]).is_ok());

        let err = check_layout(&params, &[&[2, 3], &[4]]).unwrap_err();
        match err {
            FedError::ShapeMismatch { detail } => assert!(detail.starts_with("array 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_array_leaves_target_untouched_on_mismatch() {
        let mut target = Array2::<f32>::zeros((2, 2));
        let source = Array1::<f32>::ones(4).into_dyn();
        assert!(decode_array(0, &source, &mut target).is_err());
        assert_eq!(target, Array2::<f32>::zeros((2, 2)));

        let source = Array2::<f32>::ones((2, 2)).into_dyn();
        decode_array(0, &source, &mut target).unwrap();
        assert_eq!(target, Array2::<f32>::ones((2, 2)));
    }
}
