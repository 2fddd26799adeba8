//! Graph preprocessing shared by the reference layers.
//!
//! Each normalisation comes in three forms, one per connectivity
//! representation, and all three compute the same matrix
//! `D^-1/2 (A + I) D^-1/2` where `D` is the (weighted) in-degree.

use candle_core::{DType, Device};
use relay_core::{IndexTensor, SparseTensor, Tensor, TensorError};
use relay_scatter::{scatter, Reduce};

/// Append one self-loop `(i, i)` per node after the existing edges.
pub fn add_self_loops(edge_index: &IndexTensor, num_nodes: usize) -> Result<IndexTensor, TensorError> {
    let loops = (0..num_nodes as i64).collect::<Vec<_>>();
    let mut source = edge_index.row(0)?.to_vec();
    let mut target = edge_index.row(1)?.to_vec();
    source.extend_from_slice(&loops);
    target.extend_from_slice(&loops);
    IndexTensor::edge_index(&source, &target)
}

/// Weighted count of entries per node id. Missing weights count as 1.
pub fn degree(index: &[usize], weights: Option<&[f32]>, num_nodes: usize) -> Result<Vec<f32>, TensorError> {
    let w = match weights {
        Some(w) => Tensor::from_vec(w.to_vec())?,
        None => Tensor::ones(&[index.len()])?,
    };
    scatter(&w, index, 0, num_nodes, Reduce::Sum)?.to_vec()
}

fn inv_sqrt(deg: Vec<f32>) -> Vec<f32> {
    deg.into_iter()
        .map(|d| if d > 0.0 { d.powf(-0.5) } else { 0.0 })
        .collect()
}

fn require_square(rows: usize, cols: usize) -> Result<(), TensorError> {
    if rows == cols {
        Ok(())
    } else {
        Err(TensorError::InvalidShape {
            reason: format!("symmetric normalisation needs a square matrix, got {rows}x{cols}"),
        })
    }
}

/// Symmetric GCN normalisation of an edge list.
///
/// Returns the (optionally self-looped) edge list and one weight per edge.
pub fn gcn_norm(
    edge_index: &IndexTensor,
    edge_weight: Option<&[f32]>,
    num_nodes: usize,
    self_loops: bool,
) -> Result<(IndexTensor, Vec<f32>), TensorError> {
    let edges = edge_index.num_columns();
    let mut weights = match edge_weight {
        Some(w) if w.len() == edges => w.to_vec(),
        Some(w) => {
            return Err(TensorError::ShapeMismatch {
                expected: vec![edges],
                actual: vec![w.len()],
            })
        }
        None => vec![1.0; edges],
    };
    let edge_index = if self_loops {
        weights.extend(std::iter::repeat_n(1.0, num_nodes));
        add_self_loops(edge_index, num_nodes)?
    } else {
        edge_index.clone()
    };

    let source = edge_index.row_as_usize(0)?;
    let target = edge_index.row_as_usize(1)?;
    let dis = inv_sqrt(degree(&target, Some(&weights), num_nodes)?);
    let norm = source
        .iter()
        .zip(&target)
        .zip(&weights)
        .map(|((&s, &t), &w)| dis[s] * w * dis[t])
        .collect();
    Ok((edge_index, norm))
}

/// Symmetric GCN normalisation of a sparse `adj_t`.
pub fn gcn_norm_sparse(adj_t: &SparseTensor, self_loops: bool) -> Result<SparseTensor, TensorError> {
    let (rows, cols) = adj_t.sparse_sizes();
    require_square(rows, cols)?;
    let mut row = adj_t.row().to_vec();
    let mut col = adj_t.col().to_vec();
    let mut value = adj_t
        .value()
        .map_or_else(|| vec![1.0; adj_t.nnz()], <[f32]>::to_vec);
    if self_loops {
        row.extend(0..rows);
        col.extend(0..rows);
        value.extend(std::iter::repeat_n(1.0, rows));
    }

    let dis = inv_sqrt(degree(&row, Some(&value), rows)?);
    let norm = row
        .iter()
        .zip(&col)
        .zip(&value)
        .map(|((&r, &c), &v)| dis[r] * v * dis[c])
        .collect();
    SparseTensor::from_coo(row, col, Some(norm), (rows, cols))
}

/// Symmetric GCN normalisation of a dense `adj_t`.
pub fn gcn_norm_dense(adj_t: &Tensor, self_loops: bool) -> Result<Tensor, TensorError> {
    if adj_t.rank() != 2 {
        return Err(TensorError::InvalidShape {
            reason: format!("dense adjacency needs rank 2, got {:?}", adj_t.shape()),
        });
    }
    let (rows, cols) = (adj_t.dim(0)?, adj_t.dim(1)?);
    require_square(rows, cols)?;
    let a = if self_loops {
        let eye = candle_core::Tensor::eye(rows, DType::F32, &Device::Cpu)?;
        adj_t.add(&Tensor::from_candle(eye)?)?
    } else {
        adj_t.clone()
    };
    let deg = Tensor::from_candle(a.as_candle().sum(1)?)?.to_vec()?;
    let dis = inv_sqrt(deg);
    a.scale_along(0, &dis)?.scale_along(1, &dis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> IndexTensor {
        IndexTensor::edge_index(&[0, 1, 2], &[1, 2, 0]).unwrap()
    }

    #[test]
    fn self_loops_are_appended() {
        let looped = add_self_loops(&triangle(), 3).unwrap();
        assert_eq!(looped.row(0).unwrap(), &[0, 1, 2, 0, 1, 2]);
        assert_eq!(looped.row(1).unwrap(), &[1, 2, 0, 0, 1, 2]);
    }

    #[test]
    fn weighted_degree() {
        assert_eq!(degree(&[0, 0, 2], None, 4).unwrap(), vec![2.0, 0.0, 1.0, 0.0]);
        assert_eq!(
            degree(&[1, 1], Some(&[0.5, 2.0]), 2).unwrap(),
            vec![0.0, 2.5]
        );
    }

    #[test]
    fn triangle_with_loops_normalises_to_half() {
        let (edges, norm) = gcn_norm(&triangle(), None, 3, true).unwrap();
        assert_eq!(edges.num_columns(), 6);
        assert!(norm.iter().all(|&w| (w - 0.5).abs() < 1e-6));
    }

    #[test]
    fn isolated_nodes_get_zero_weight() {
        let edges = IndexTensor::edge_index(&[0], &[1]).unwrap();
        let (_, norm) = gcn_norm(&edges, None, 3, false).unwrap();
        // Node 0 has no incoming edges, so its factor is 0.
        assert_eq!(norm, vec![0.0]);
    }

    #[test]
    fn edge_weight_length_is_checked() {
        assert!(gcn_norm(&triangle(), Some(&[1.0]), 3, false).is_err());
    }

    #[test]
    fn all_forms_agree() {
        let edges = IndexTensor::edge_index(&[0, 1, 1, 3], &[1, 2, 0, 0]).unwrap();
        let (looped, norm) = gcn_norm(&edges, None, 4, true).unwrap();
        let from_list = SparseTensor::adj_t_from_edge_index(&looped, Some(norm), 4)
            .unwrap()
            .to_dense().unwrap();

        let adj_t = SparseTensor::adj_t_from_edge_index(&edges, None, 4).unwrap();
        let from_sparse = gcn_norm_sparse(&adj_t, true).unwrap().to_dense().unwrap();
        let from_dense = gcn_norm_dense(&adj_t.to_dense().unwrap(), true).unwrap();

        assert!(from_list.approx_eq(&from_sparse, 1e-6));
        assert!(from_list.approx_eq(&from_dense, 1e-6));
    }

    #[test]
    fn rectangular_matrices_are_rejected() {
        assert!(gcn_norm_sparse(&SparseTensor::empty((2, 3)), false).is_err());
        assert!(gcn_norm_dense(&Tensor::zeros(&[2, 3]).unwrap(), false).is_err());
    }
}
