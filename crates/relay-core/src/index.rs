//! Integer tensors, used for edge lists.

use crate::error::TensorError;
use crate::tensor::{Shape, Tensor};

/// A dense, row-major tensor of `i64` values.
///
/// An `IndexTensor` of shape `[2, E]` is an edge list: row 0 holds source
/// node ids, row 1 target node ids. Any other rank-2 integer matrix is
/// treated as a dense adjacency matrix by the connectivity classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexTensor {
    shape: Shape,
    data: Vec<i64>,
}

impl IndexTensor {
    /// Create an index tensor from a shape and a row-major buffer.
    pub fn new(shape: &[usize], data: Vec<i64>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: Shape::from_slice(shape),
            data,
        })
    }

    /// Build a `[2, E]` edge list from parallel source and target slices.
    pub fn edge_index(source: &[i64], target: &[i64]) -> Result<Self, TensorError> {
        if source.len() != target.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![source.len()],
                actual: vec![target.len()],
            });
        }
        let mut data = Vec::with_capacity(source.len() * 2);
        data.extend_from_slice(source);
        data.extend_from_slice(target);
        Self::new(&[2, source.len()], data)
    }

    /// The shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The row-major buffer.
    pub fn data(&self) -> &[i64] {
        &self.data
    }

    /// Whether the shape is `[2, E]`.
    pub fn is_edge_list(&self) -> bool {
        self.rank() == 2 && self.shape[0] == 2
    }

    /// Number of columns of a rank-2 tensor (edges, for an edge list).
    pub fn num_columns(&self) -> usize {
        if self.rank() == 2 {
            self.shape[1]
        } else {
            0
        }
    }

    /// One row of a rank-2 tensor.
    pub fn row(&self, r: usize) -> Result<&[i64], TensorError> {
        if self.rank() != 2 {
            return Err(TensorError::InvalidShape {
                reason: format!("row access needs rank 2, got {:?}", self.shape.as_slice()),
            });
        }
        if r >= self.shape[0] {
            return Err(TensorError::IndexOutOfBounds {
                index: r,
                bound: self.shape[0],
            });
        }
        let cols = self.shape[1];
        Ok(&self.data[r * cols..(r + 1) * cols])
    }

    /// Convert a row to node ids, rejecting negative entries.
    pub fn row_as_usize(&self, r: usize) -> Result<Vec<usize>, TensorError> {
        self.row(r)?
            .iter()
            .map(|&v| {
                usize::try_from(v).map_err(|_| TensorError::InvalidShape {
                    reason: format!("negative node id {v} in row {r}"),
                })
            })
            .collect()
    }

    /// The values as an `f32` tensor of the same shape.
    pub fn to_float(&self) -> Result<Tensor, TensorError> {
        let data = self.data.iter().map(|&v| v as f32).collect();
        Tensor::new(&self.shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_index_layout() {
        let ei = IndexTensor::edge_index(&[0, 1, 2], &[1, 2, 0]).unwrap();
        assert!(ei.is_edge_list());
        assert_eq!(ei.num_columns(), 3);
        assert_eq!(ei.row(0).unwrap(), &[0, 1, 2]);
        assert_eq!(ei.row(1).unwrap(), &[1, 2, 0]);
        assert!(ei.row(2).is_err());
    }

    #[test]
    fn mismatched_rows_rejected() {
        assert!(IndexTensor::edge_index(&[0, 1], &[1]).is_err());
    }

    #[test]
    fn negative_ids_rejected() {
        let ei = IndexTensor::edge_index(&[0, -1], &[1, 0]).unwrap();
        assert!(ei.row_as_usize(0).is_err());
        assert_eq!(ei.row_as_usize(1).unwrap(), vec![1, 0]);
    }

    #[test]
    fn square_integer_matrix_is_not_edge_list() {
        let m = IndexTensor::new(&[3, 3], vec![0; 9]).unwrap();
        assert!(!m.is_edge_list());
        assert_eq!(m.to_float().unwrap().shape(), &[3, 3]);
    }
}
