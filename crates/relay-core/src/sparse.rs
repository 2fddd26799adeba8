//! CSR-ordered sparse adjacency matrices.

use std::ops::Range;

use crate::error::TensorError;
use crate::index::IndexTensor;
use crate::tensor::Tensor;

/// A sparse matrix stored as `(row, col, value)` triples sorted by row,
/// then column, with a cached CSR row pointer.
///
/// Message passing consumes adjacency matrices in *transposed* form
/// (`adj_t`): row `r` lists the sources that send messages to target `r`.
/// [`from_edge_index`](Self::from_edge_index) builds the untransposed
/// matrix (row = source); call [`t`](Self::t) to obtain `adj_t`, or use
/// [`adj_t_from_edge_index`](Self::adj_t_from_edge_index) directly.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseTensor {
    row: Vec<usize>,
    col: Vec<usize>,
    value: Option<Vec<f32>>,
    rowptr: Vec<usize>,
    sizes: (usize, usize),
}

impl SparseTensor {
    /// Build from unsorted coordinate triples.
    ///
    /// Entries are stably sorted by `(row, col)`; duplicates are kept.
    pub fn from_coo(
        row: Vec<usize>,
        col: Vec<usize>,
        value: Option<Vec<f32>>,
        sizes: (usize, usize),
    ) -> Result<Self, TensorError> {
        if row.len() != col.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![row.len()],
                actual: vec![col.len()],
            });
        }
        if let Some(v) = &value {
            if v.len() != row.len() {
                return Err(TensorError::ShapeMismatch {
                    expected: vec![row.len()],
                    actual: vec![v.len()],
                });
            }
        }
        if let Some(&r) = row.iter().find(|&&r| r >= sizes.0) {
            return Err(TensorError::IndexOutOfBounds {
                index: r,
                bound: sizes.0,
            });
        }
        if let Some(&c) = col.iter().find(|&&c| c >= sizes.1) {
            return Err(TensorError::IndexOutOfBounds {
                index: c,
                bound: sizes.1,
            });
        }

        Ok(Self::sorted(row, col, value, sizes))
    }

    /// Sort validated triples into CSR order and build the row pointer.
    fn sorted(
        row: Vec<usize>,
        col: Vec<usize>,
        value: Option<Vec<f32>>,
        sizes: (usize, usize),
    ) -> Self {
        let mut perm: Vec<usize> = (0..row.len()).collect();
        perm.sort_by_key(|&e| (row[e], col[e]));
        let row: Vec<usize> = perm.iter().map(|&e| row[e]).collect();
        let col: Vec<usize> = perm.iter().map(|&e| col[e]).collect();
        let value = value.map(|v| perm.iter().map(|&e| v[e]).collect());

        let mut rowptr = vec![0usize; sizes.0 + 1];
        for &r in &row {
            rowptr[r + 1] += 1;
        }
        for i in 0..sizes.0 {
            rowptr[i + 1] += rowptr[i];
        }

        Self {
            row,
            col,
            value,
            rowptr,
            sizes,
        }
    }

    /// Build from an edge list: row = source (row 0), col = target (row 1).
    pub fn from_edge_index(
        edge_index: &IndexTensor,
        value: Option<Vec<f32>>,
        sizes: (usize, usize),
    ) -> Result<Self, TensorError> {
        if !edge_index.is_edge_list() {
            return Err(TensorError::InvalidShape {
                reason: format!("expected [2, E] edge list, got {:?}", edge_index.shape()),
            });
        }
        let row = edge_index.row_as_usize(0)?;
        let col = edge_index.row_as_usize(1)?;
        Self::from_coo(row, col, value, sizes)
    }

    /// Build the transposed adjacency of an edge list: row = target,
    /// col = source. `num_nodes` sizes both dimensions.
    pub fn adj_t_from_edge_index(
        edge_index: &IndexTensor,
        value: Option<Vec<f32>>,
        num_nodes: usize,
    ) -> Result<Self, TensorError> {
        if !edge_index.is_edge_list() {
            return Err(TensorError::InvalidShape {
                reason: format!("expected [2, E] edge list, got {:?}", edge_index.shape()),
            });
        }
        let row = edge_index.row_as_usize(1)?;
        let col = edge_index.row_as_usize(0)?;
        Self::from_coo(row, col, value, (num_nodes, num_nodes))
    }

    /// Build from the non-zero entries of a rank-2 dense matrix.
    pub fn from_dense(dense: &Tensor) -> Result<Self, TensorError> {
        if dense.rank() != 2 {
            return Err(TensorError::InvalidShape {
                reason: format!("dense adjacency needs rank 2, got {:?}", dense.shape()),
            });
        }
        let (rows, cols) = (dense.shape()[0], dense.shape()[1]);
        let data = dense.to_vec()?;
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut value = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let v = data[r * cols + c];
                if v != 0.0 {
                    row.push(r);
                    col.push(c);
                    value.push(v);
                }
            }
        }
        Self::from_coo(row, col, Some(value), (rows, cols))
    }

    /// Row index of each stored entry.
    pub fn row(&self) -> &[usize] {
        &self.row
    }

    /// Column index of each stored entry.
    pub fn col(&self) -> &[usize] {
        &self.col
    }

    /// Stored values, if the matrix carries any (value-less matrices are
    /// implicitly all ones).
    pub fn value(&self) -> Option<&[f32]> {
        self.value.as_deref()
    }

    /// CSR row pointer of length `rows + 1`.
    pub fn rowptr(&self) -> &[usize] {
        &self.rowptr
    }

    /// `(rows, cols)`.
    pub fn sparse_sizes(&self) -> (usize, usize) {
        self.sizes
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    /// Entry range of row `r` in CSR order.
    pub fn row_range(&self, r: usize) -> Range<usize> {
        self.rowptr[r]..self.rowptr[r + 1]
    }

    /// Number of stored entries per row.
    pub fn row_degrees(&self) -> Vec<usize> {
        self.rowptr.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The transposed matrix, re-sorted into CSR order.
    pub fn t(&self) -> Self {
        let (rows, cols) = self.sizes;
        Self::sorted(
            self.col.clone(),
            self.row.clone(),
            self.value.clone(),
            (cols, rows),
        )
    }

    /// A matrix with no stored entries.
    pub fn empty(sizes: (usize, usize)) -> Self {
        Self {
            row: Vec::new(),
            col: Vec::new(),
            value: None,
            rowptr: vec![0; sizes.0 + 1],
            sizes,
        }
    }

    /// Materialize as a dense `[rows, cols]` tensor. Duplicates accumulate.
    pub fn to_dense(&self) -> Result<Tensor, TensorError> {
        let (rows, cols) = self.sizes;
        let mut data = vec![0.0f32; rows * cols];
        for e in 0..self.nnz() {
            let v = self.value.as_ref().map_or(1.0, |v| v[e]);
            data[self.row[e] * cols + self.col[e]] += v;
        }
        Tensor::new(&[rows, cols], data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> IndexTensor {
        IndexTensor::edge_index(&[0, 1, 2], &[1, 2, 0]).unwrap()
    }

    #[test]
    fn coo_is_sorted_with_rowptr() {
        let s = SparseTensor::from_coo(
            vec![2, 0, 1, 0],
            vec![0, 2, 1, 1],
            Some(vec![4.0, 2.0, 3.0, 1.0]),
            (3, 3),
        )
        .unwrap();
        assert_eq!(s.row(), &[0, 0, 1, 2]);
        assert_eq!(s.col(), &[1, 2, 1, 0]);
        assert_eq!(s.value().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.rowptr(), &[0, 2, 3, 4]);
        assert_eq!(s.row_degrees(), vec![2, 1, 1]);
    }

    #[test]
    fn adj_t_rows_are_targets() {
        let adj_t = SparseTensor::adj_t_from_edge_index(&triangle(), None, 3).unwrap();
        // Edge 0->1 lands in row 1, column 0.
        assert_eq!(adj_t.row(), &[0, 1, 2]);
        assert_eq!(adj_t.col(), &[2, 0, 1]);
        assert_eq!(adj_t, SparseTensor::from_edge_index(&triangle(), None, (3, 3)).unwrap().t());
    }

    #[test]
    fn out_of_range_entries_rejected() {
        let err = SparseTensor::from_coo(vec![3], vec![0], None, (3, 3)).unwrap_err();
        assert_eq!(err, TensorError::IndexOutOfBounds { index: 3, bound: 3 });
    }

    #[test]
    fn dense_round_trip_keeps_values() {
        let dense = Tensor::new(&[2, 3], vec![0.0, 2.0, 0.0, 1.0, 0.0, 5.0]).unwrap();
        let s = SparseTensor::from_dense(&dense).unwrap();
        assert_eq!(s.nnz(), 3);
        assert_eq!(s.to_dense().unwrap(), dense);
        assert_eq!(s.t().sparse_sizes(), (3, 2));
    }

    #[test]
    fn empty_rows_have_zero_degree() {
        let s = SparseTensor::from_coo(vec![2], vec![0], None, (4, 4)).unwrap();
        assert_eq!(s.rowptr(), &[0, 0, 0, 1, 1]);
        assert_eq!(s.row_range(2), 0..1);
        assert_eq!(s.row_range(3), 1..1);
    }
}
