//! `(SparseAdj, fused)` and `(SparseAdj, sparse)`.
//!
//! Both read edges as the stored entries of `adj_t` in CSR order: the row
//! is the receiving node, the column the sending node.

use std::borrow::Cow;

use relay_core::{SparseTensor, Tensor};

use super::{adjacency_size, gather, ArgMap, CollectContext, Collected, EndpointRows, Slots};
use crate::args::{Adjacency, Arg, Kwargs, Size};
use crate::config::Flow;
use crate::error::PropagateError;
use crate::inspector::Endpoint;

fn gather_entries<'a>(
    adj_t: &SparseTensor,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<ArgMap<'a>, PropagateError> {
    gather(
        kwargs,
        ctx,
        EndpointRows::for_flow(Flow::SourceToTarget),
        |endpoint| match endpoint {
            Endpoint::I => Slots::Ids(adj_t.row()),
            Endpoint::J => Slots::Ids(adj_t.col()),
        },
    )
}

fn inject_sizes(values: &mut ArgMap<'_>, ctx: &CollectContext<'_>, size: Size) {
    ctx.inject(values, "size_i", || Arg::Count(size.num_targets));
    ctx.inject(values, "size_j", || Arg::Count(size.num_sources));
    ctx.inject(values, "dim_size", || Arg::Count(size.num_targets));
}

pub(super) fn collect_sparse<'a>(
    adj_t: &'a SparseTensor,
    size: Option<Size>,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Collected<'a>, PropagateError> {
    let size = adjacency_size(adj_t.sparse_sizes(), size, kwargs, ctx)?;
    let mut values = gather_entries(adj_t, kwargs, ctx)?;

    ctx.inject(&mut values, "edge_index_i", || Arg::Index(adj_t.row().to_vec()));
    ctx.inject(&mut values, "edge_index_j", || Arg::Index(adj_t.col().to_vec()));
    ctx.inject(&mut values, "index", || Arg::Index(adj_t.row().to_vec()));
    ctx.inject(&mut values, "ptr", || Arg::Index(adj_t.rowptr().to_vec()));
    inject_sizes(&mut values, ctx, size);

    if kwargs.get("edge_weight").is_none() && ctx.wants("edge_weight") {
        if let Some(weights) = adj_t.value() {
            values.insert(
                "edge_weight".to_string(),
                Cow::Owned(Arg::Tensor(Tensor::from_vec(weights.to_vec())?)),
            );
        }
    }

    Ok(Collected {
        values,
        adj_t: None,
        size,
    })
}

pub(super) fn collect_fused<'a>(
    adj_t: &'a SparseTensor,
    size: Option<Size>,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Collected<'a>, PropagateError> {
    let size = adjacency_size(adj_t.sparse_sizes(), size, kwargs, ctx)?;
    let mut values = gather_entries(adj_t, kwargs, ctx)?;
    inject_sizes(&mut values, ctx, size);

    Ok(Collected {
        values,
        adj_t: Some(Adjacency::Sparse(adj_t)),
        size,
    })
}
