//! `(EdgeIndex, sparse)`: per-edge messages scattered by target id.

use relay_core::IndexTensor;

use super::{check_size, gather, observed_sizes, CollectContext, Collected, EndpointRows, Slots};
use crate::args::{Arg, Kwargs, Size};
use crate::error::{ConfigError, PropagateError};

fn node_ids(edge_index: &IndexTensor, row: usize) -> Result<Vec<usize>, PropagateError> {
    edge_index
        .row_as_usize(row)
        .map_err(|e| PropagateError::InvalidConnectivity {
            reason: e.to_string(),
        })
}

fn infer(observed: [Option<usize>; 2]) -> Result<Size, ConfigError> {
    match observed {
        [Some(num_sources), Some(num_targets)] => Ok(Size {
            num_targets,
            num_sources,
        }),
        [Some(n), None] | [None, Some(n)] => Ok(Size::square(n)),
        [None, None] => Err(ConfigError::UnknownSize),
    }
}

pub(super) fn collect<'a>(
    edge_index: &IndexTensor,
    size: Option<Size>,
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Collected<'a>, PropagateError> {
    let rows = EndpointRows::for_flow(ctx.flow);
    let ids = [node_ids(edge_index, 0)?, node_ids(edge_index, 1)?];

    let observed = observed_sizes(kwargs, ctx, rows)?;
    let size = match size {
        Some(explicit) => {
            check_size(explicit, observed)?;
            explicit
        }
        None => infer(observed)?,
    };
    for (row, row_ids) in ids.iter().enumerate() {
        let bound = size.of_row(row);
        if let Some(&bad) = row_ids.iter().find(|&&n| n >= bound) {
            return Err(PropagateError::InvalidConnectivity {
                reason: format!("node id {bad} in edge_index row {row} is out of range for {bound} nodes"),
            });
        }
    }

    let mut values = gather(kwargs, ctx, rows, |endpoint| Slots::Ids(&ids[rows.of(endpoint)]))?;

    let (size_i, size_j) = (size.of_row(rows.i), size.of_row(rows.j));
    ctx.inject(&mut values, "edge_index_i", || Arg::Index(ids[rows.i].clone()));
    ctx.inject(&mut values, "edge_index_j", || Arg::Index(ids[rows.j].clone()));
    ctx.inject(&mut values, "index", || Arg::Index(ids[rows.i].clone()));
    ctx.inject(&mut values, "size_i", || Arg::Count(size_i));
    ctx.inject(&mut values, "size_j", || Arg::Count(size_j));
    ctx.inject(&mut values, "dim_size", || Arg::Count(size_i));

    Ok(Collected {
        values,
        adj_t: None,
        size,
    })
}
