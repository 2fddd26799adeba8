//! `(SparseAdj, partial)` and `(DenseAdj, partial)`: padded neighbourhood
//! bins.
//!
//! Each non-empty row of `adj_t` becomes one or more bin rows holding at
//! most `K` neighbours, where `K` is the bin width. With binning enabled,
//! rows are grouped by power-of-two degree class so padding stays below
//! half of each bin; otherwise a single bin is as wide as the largest row.
//! `partial_max_deg` caps the width and splits longer rows into chunks.

use std::borrow::Cow;
use std::collections::BTreeMap;

use relay_core::{SparseTensor, Tensor, TensorError};

use super::{adjacency_size, gather, Bin, Binned, CollectContext, EndpointRows, Slots};
use crate::args::{Arg, Kwargs, Size};
use crate::config::Flow;
use crate::error::PropagateError;
use crate::inspector::Endpoint;

/// Consecutive neighbours of one row, `start..start + len` in CSR order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Chunk {
    row: usize,
    start: usize,
    len: usize,
}

fn chunk_rows(adj_t: &SparseTensor, max_deg: Option<usize>) -> Vec<Chunk> {
    let cap = max_deg.unwrap_or(usize::MAX).max(1);
    let (rows, _) = adj_t.sparse_sizes();
    let mut chunks = Vec::new();
    for row in 0..rows {
        let range = adj_t.row_range(row);
        let mut start = range.start;
        while start < range.end {
            let len = (range.end - start).min(cap);
            chunks.push(Chunk { row, start, len });
            start += len;
        }
    }
    chunks
}

/// Group chunks into bins keyed by width, narrowest first.
fn group_by_width(
    chunks: Vec<Chunk>,
    binning: bool,
    max_deg: Option<usize>,
) -> BTreeMap<usize, Vec<Chunk>> {
    let mut bins: BTreeMap<usize, Vec<Chunk>> = BTreeMap::new();
    if binning {
        for c in chunks {
            let class = c.len.next_power_of_two();
            let width = max_deg.map_or(class, |k| class.min(k));
            bins.entry(width).or_default().push(c);
        }
    } else if let Some(width) = chunks.iter().map(|c| c.len).max() {
        bins.insert(width, chunks);
    }
    bins
}

/// Per-entry weights: the caller's `edge_weight`, else the stored values,
/// else ones.
fn entry_weights(adj_t: &SparseTensor, kwargs: &Kwargs) -> Result<Vec<f32>, TensorError> {
    let nnz = adj_t.nnz();
    match kwargs.get("edge_weight") {
        Some(Arg::Tensor(t)) if t.rank() == 1 && t.numel() == nnz => Ok(t.to_vec()?),
        Some(Arg::Tensor(t)) => Err(TensorError::ShapeMismatch {
            expected: vec![nnz],
            actual: t.shape().to_vec(),
        }),
        _ => Ok(adj_t
            .value()
            .map_or_else(|| vec![1.0; nnz], <[f32]>::to_vec)),
    }
}

/// Insert an axis of length `width` after `axis`, splitting `R * width`
/// into `[R, width]`.
pub(super) fn split_axis(t: Tensor, axis: usize, rows: usize, width: usize) -> Result<Tensor, TensorError> {
    let mut shape = t.shape().to_vec();
    shape.splice(axis..=axis, [rows, width]);
    t.reshape(&shape)
}

fn build_bin<'a>(
    adj_t: &SparseTensor,
    weights: &[f32],
    width: usize,
    chunks: &[Chunk],
    size: Size,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Bin<'a>, PropagateError> {
    let r = chunks.len();
    let mut slots = Vec::with_capacity(r * width);
    let mut mask = Vec::with_capacity(r * width);
    let mut edge_weight = Vec::with_capacity(r * width);
    for c in chunks {
        for k in 0..width {
            if k < c.len {
                let e = c.start + k;
                slots.push(Some(adj_t.col()[e]));
                mask.push(1.0);
                edge_weight.push(weights[e]);
            } else {
                slots.push(None);
                mask.push(0.0);
                edge_weight.push(0.0);
            }
        }
    }
    let rows: Vec<usize> = chunks.iter().map(|c| c.row).collect();
    let counts: Vec<usize> = chunks.iter().map(|c| c.len).collect();

    let mut values = gather(
        kwargs,
        ctx,
        EndpointRows::for_flow(Flow::SourceToTarget),
        |endpoint| match endpoint {
            Endpoint::J => Slots::Padded {
                slots: &slots,
                rows: r,
                width,
            },
            Endpoint::I => Slots::Ids(&rows),
        },
    )?;

    let edge_weight = Tensor::new(&[r, width], edge_weight)?;
    let mask = Tensor::new(&[r, width], mask)?;
    if ctx.wants("edge_weight") {
        values.insert("edge_weight".to_string(), Cow::Owned(Arg::Tensor(edge_weight)));
    }
    ctx.inject(&mut values, "mask", || Arg::Tensor(mask));
    ctx.inject(&mut values, "index", || Arg::Index(rows.clone()));
    ctx.inject(&mut values, "size_i", || Arg::Count(size.num_targets));
    ctx.inject(&mut values, "size_j", || Arg::Count(size.num_sources));
    ctx.inject(&mut values, "dim_size", || Arg::Count(size.num_targets));

    Ok(Bin {
        values,
        rows,
        counts,
    })
}

pub(super) fn collect<'a>(
    adj_t: &SparseTensor,
    size: Option<Size>,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Binned<'a>, PropagateError> {
    let size = adjacency_size(adj_t.sparse_sizes(), size, kwargs, ctx)?;
    let weights = entry_weights(adj_t, kwargs)?;
    let chunks = chunk_rows(adj_t, ctx.partial_max_deg);
    let mut groups = group_by_width(chunks, ctx.partial_binning, ctx.partial_max_deg);
    if groups.is_empty() {
        // A graph without edges still runs one empty bin so the hooks fix
        // the output's feature shape.
        groups.insert(1, Vec::new());
    }

    let bins = groups
        .iter()
        .map(|(&width, chunks)| build_bin(adj_t, &weights, width, chunks, size, kwargs, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Binned { bins, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> SparseTensor {
        // Row 0 has 5 neighbours, row 1 has 1, row 2 none, row 3 has 2.
        SparseTensor::from_coo(
            vec![0, 0, 0, 0, 0, 1, 3, 3],
            vec![1, 2, 3, 4, 5, 0, 0, 1],
            None,
            (6, 6),
        )
        .unwrap()
    }

    #[test]
    fn rows_split_at_max_degree() {
        let chunks = chunk_rows(&star(), Some(2));
        let lens: Vec<_> = chunks.iter().map(|c| (c.row, c.len)).collect();
        assert_eq!(lens, [(0, 2), (0, 2), (0, 1), (1, 1), (3, 2)]);
        assert_eq!(chunks[1].start, 2);
    }

    #[test]
    fn binning_groups_by_power_of_two() {
        let groups = group_by_width(chunk_rows(&star(), None), true, None);
        let shape: Vec<_> = groups.iter().map(|(w, c)| (*w, c.len())).collect();
        assert_eq!(shape, [(1, 1), (2, 1), (8, 1)]);

        let capped = group_by_width(chunk_rows(&star(), Some(3)), true, Some(3));
        let shape: Vec<_> = capped.iter().map(|(w, c)| (*w, c.len())).collect();
        // Chunks of 3, 2, 1, 2 land in widths 3 (capped from 4), 2 and 1.
        assert_eq!(shape, [(1, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn single_bin_without_binning() {
        let groups = group_by_width(chunk_rows(&star(), None), false, None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.get(&5).map(Vec::len), Some(3));
    }

    #[test]
    fn caller_weights_must_cover_entries() {
        let kwargs = Kwargs::new().with("edge_weight", Tensor::ones(&[3]).unwrap());
        assert!(entry_weights(&star(), &kwargs).is_err());
        let kwargs = Kwargs::new().with("edge_weight", Tensor::full(&[8], 2.0).unwrap());
        assert_eq!(entry_weights(&star(), &kwargs).unwrap(), vec![2.0; 8]);
        assert_eq!(entry_weights(&star(), &Kwargs::new()).unwrap(), vec![1.0; 8]);
    }

    #[test]
    fn split_axis_inserts_neighbour_axis() {
        let t = Tensor::zeros(&[4, 6]).unwrap();
        assert_eq!(split_axis(t.clone(), 1, 2, 3).unwrap().shape(), &[4, 2, 3]);
        assert_eq!(split_axis(Tensor::zeros(&[6, 4]).unwrap(), 0, 3, 2).unwrap().shape(), &[3, 2, 4]);
    }
}
