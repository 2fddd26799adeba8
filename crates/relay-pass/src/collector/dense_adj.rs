//! `(DenseAdj, fused)`.

use std::borrow::Cow;

use relay_core::Tensor;

use super::{adjacency_size, gather, CollectContext, Collected, EndpointRows, Slots};
use crate::args::{Adjacency, Arg, Kwargs, Size};
use crate::error::{ConfigError, PropagateError};
use crate::format::Connectivity;

/// The connectivity as a floating-point matrix. Integer matrices are
/// converted; float matrices are borrowed.
pub(super) fn dense_view(connectivity: &Connectivity) -> Result<Cow<'_, Tensor>, PropagateError> {
    match connectivity {
        Connectivity::Dense(t) => Ok(Cow::Borrowed(t)),
        Connectivity::Index(t) => Ok(Cow::Owned(t.to_float()?)),
        Connectivity::Sparse(_) => Err(PropagateError::InvalidConnectivity {
            reason: "expected a dense adjacency matrix".into(),
        }),
    }
}

pub(super) fn collect_fused<'a>(
    adj_t: Cow<'a, Tensor>,
    size: Option<Size>,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Collected<'a>, PropagateError> {
    if let Some(b) = ctx.bindings.iter().find(|b| b.endpoint.is_some()) {
        return Err(ConfigError::SuffixedDenseParam {
            name: b.name.clone(),
        }
        .into());
    }
    let shape = (adj_t.dim(0)?, adj_t.dim(1)?);
    let size = adjacency_size(shape, size, kwargs, ctx)?;

    // No endpoint parameters remain, so nothing is sliced.
    let mut values = gather(kwargs, ctx, EndpointRows::for_flow(ctx.flow), |_| Slots::Ids(&[]))?;
    ctx.inject(&mut values, "size_i", || Arg::Count(size.num_targets));
    ctx.inject(&mut values, "size_j", || Arg::Count(size.num_sources));
    ctx.inject(&mut values, "dim_size", || Arg::Count(size.num_targets));

    Ok(Collected {
        values,
        adj_t: Some(Adjacency::Dense(adj_t)),
        size,
    })
}
