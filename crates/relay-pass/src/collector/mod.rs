//! Argument collectors.
//!
//! A [`Collector`] is bound to one reachable `(representation, strategy)`
//! pair. Given the raw connectivity, an optional [`Size`] and the caller's
//! [`Kwargs`], it produces the inputs of the strategy's hooks:
//! endpoint-sliced node tensors, the structural layout the reduction
//! needs (`index`, `ptr`, sizes), and the resolved node counts. Caller data
//! is borrowed, never modified.

mod dense_adj;
mod edge_index;
mod partial;
mod sparse_adj;

use std::borrow::Cow;

use indexmap::IndexMap;
use relay_core::{SparseTensor, Tensor, TensorError};

use crate::args::{Adjacency, Arg, Kwargs, Size};
use crate::config::Flow;
use crate::error::{ConfigError, PropagateError};
use crate::format::{Connectivity, Representation, Strategy};
use crate::inspector::{Endpoint, ParamBinding};
use crate::layer::Hook;

/// Collected arguments keyed by parameter name.
pub(crate) type ArgMap<'a> = IndexMap<String, Cow<'a, Arg>>;

/// Per-call settings shared by every collector.
pub(crate) struct CollectContext<'c> {
    pub flow: Flow,
    pub node_dim: usize,
    /// Bindings of every hook the strategy will call.
    pub bindings: Vec<&'c ParamBinding>,
    pub partial_max_deg: Option<usize>,
    pub partial_binning: bool,
}

impl CollectContext<'_> {
    /// Whether any hook declared `name`.
    fn wants(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    /// Insert a structural entry if some hook declared it.
    fn inject<'a>(&self, values: &mut ArgMap<'a>, name: &str, value: impl FnOnce() -> Arg) {
        if self.wants(name) {
            values.insert(name.to_string(), Cow::Owned(value()));
        }
    }
}

/// Inputs of a fused or message/aggregate strategy.
pub(crate) struct Collected<'a> {
    pub values: ArgMap<'a>,
    pub adj_t: Option<Adjacency<'a>>,
    pub size: Size,
}

/// One neighbourhood bin of a partial strategy.
pub(crate) struct Bin<'a> {
    pub values: ArgMap<'a>,
    /// Target node of each bin row.
    pub rows: Vec<usize>,
    /// Real neighbours in each bin row.
    pub counts: Vec<usize>,
}

/// Inputs of a partial strategy.
pub(crate) struct Binned<'a> {
    pub bins: Vec<Bin<'a>>,
    pub size: Size,
}

pub(crate) enum Collection<'a> {
    Edges(Collected<'a>),
    Bins(Binned<'a>),
}

/// An argument collector bound to one `(representation, strategy)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collector {
    /// Edge list, message then aggregate over an index layout.
    EdgeIndexSparse,
    /// Sparse adjacency, fused hook.
    SparseAdjFused,
    /// Sparse adjacency, message then aggregate over a CSR layout.
    SparseAdjSparse,
    /// Sparse adjacency, neighbourhood bins.
    SparseAdjPartial,
    /// Dense adjacency, fused hook.
    DenseAdjFused,
    /// Dense adjacency, neighbourhood bins over its non-zero entries.
    DenseAdjPartial,
}

impl Collector {
    /// The collector for a pair, or `None` if the pair is unreachable.
    pub fn bind(repr: Representation, strategy: Strategy) -> Option<Self> {
        match (repr, strategy) {
            (Representation::EdgeIndex, Strategy::Sparse) => Some(Self::EdgeIndexSparse),
            (Representation::SparseAdj, Strategy::Fused) => Some(Self::SparseAdjFused),
            (Representation::SparseAdj, Strategy::Sparse) => Some(Self::SparseAdjSparse),
            (Representation::SparseAdj, Strategy::Partial) => Some(Self::SparseAdjPartial),
            (Representation::DenseAdj, Strategy::Fused) => Some(Self::DenseAdjFused),
            (Representation::DenseAdj, Strategy::Partial) => Some(Self::DenseAdjPartial),
            _ => None,
        }
    }

    /// The strategy this collector feeds.
    pub fn strategy(self) -> Strategy {
        match self {
            Self::SparseAdjFused | Self::DenseAdjFused => Strategy::Fused,
            Self::EdgeIndexSparse | Self::SparseAdjSparse => Strategy::Sparse,
            Self::SparseAdjPartial | Self::DenseAdjPartial => Strategy::Partial,
        }
    }

    /// Hooks whose parameters this collector gathers, in call order.
    pub fn hooks(self) -> &'static [Hook] {
        match self {
            Self::EdgeIndexSparse | Self::SparseAdjSparse => &[Hook::Message, Hook::Aggregate],
            Self::SparseAdjFused => &[Hook::SparseMessageAndAggregate],
            Self::DenseAdjFused => &[Hook::DenseMessageAndAggregate],
            Self::SparseAdjPartial | Self::DenseAdjPartial => {
                &[Hook::PartialMessage, Hook::PartialAggregate]
            }
        }
    }

    pub(crate) fn collect<'a>(
        self,
        connectivity: &'a Connectivity,
        size: Option<Size>,
        kwargs: &'a Kwargs,
        ctx: &CollectContext<'_>,
    ) -> Result<Collection<'a>, PropagateError> {
        match (self, connectivity) {
            (Self::EdgeIndexSparse, Connectivity::Index(edge_index)) => {
                edge_index::collect(edge_index, size, kwargs, ctx).map(Collection::Edges)
            }
            (Self::SparseAdjSparse, Connectivity::Sparse(adj_t)) => {
                sparse_adj::collect_sparse(adj_t, size, kwargs, ctx).map(Collection::Edges)
            }
            (Self::SparseAdjFused, Connectivity::Sparse(adj_t)) => {
                sparse_adj::collect_fused(adj_t, size, kwargs, ctx).map(Collection::Edges)
            }
            (Self::SparseAdjPartial, Connectivity::Sparse(adj_t)) => {
                partial::collect(adj_t, size, kwargs, ctx).map(Collection::Bins)
            }
            (Self::DenseAdjFused, _) => {
                let dense = dense_adj::dense_view(connectivity)?;
                dense_adj::collect_fused(dense, size, kwargs, ctx).map(Collection::Edges)
            }
            (Self::DenseAdjPartial, _) => {
                let dense = dense_adj::dense_view(connectivity)?;
                let adj_t = SparseTensor::from_dense(&dense)?;
                partial::collect(&adj_t, size, kwargs, ctx).map(Collection::Bins)
            }
            _ => Err(PropagateError::InvalidConnectivity {
                reason: format!("{self:?} collector cannot read this connectivity"),
            }),
        }
    }
}

// ── Endpoints and sizes ────────────────────────────────────────────

/// Edge-list rows holding each endpoint's node ids.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EndpointRows {
    pub i: usize,
    pub j: usize,
}

impl EndpointRows {
    pub fn for_flow(flow: Flow) -> Self {
        let (i, j) = flow.rows();
        Self { i, j }
    }

    pub fn of(self, endpoint: Endpoint) -> usize {
        match endpoint {
            Endpoint::I => self.i,
            Endpoint::J => self.j,
        }
    }
}

fn side_name(row: usize) -> &'static str {
    if row == 0 {
        "source"
    } else {
        "target"
    }
}

fn node_count(t: &Tensor, name: &str, node_dim: usize) -> Result<usize, ConfigError> {
    t.dim(node_dim).map_err(|_| ConfigError::NodeDimOutOfRange {
        name: name.to_string(),
        node_dim,
        rank: t.rank(),
    })
}

fn record(slot: &mut Option<usize>, row: usize, n: usize) -> Result<(), ConfigError> {
    match *slot {
        Some(prev) if prev != n => Err(ConfigError::SizeMismatch {
            side: side_name(row),
            expected: prev,
            actual: n,
        }),
        _ => {
            *slot = Some(n);
            Ok(())
        }
    }
}

/// Node counts per edge-list row, read off the node tensors that suffixed
/// parameters will be sliced from.
pub(crate) fn observed_sizes(
    kwargs: &Kwargs,
    ctx: &CollectContext<'_>,
    rows: EndpointRows,
) -> Result<[Option<usize>; 2], ConfigError> {
    let mut sizes = [None, None];
    for b in &ctx.bindings {
        let Some(endpoint) = b.endpoint else {
            continue;
        };
        match kwargs.get(&b.base) {
            Some(Arg::Tensor(t)) => {
                let row = rows.of(endpoint);
                record(&mut sizes[row], row, node_count(t, &b.base, ctx.node_dim)?)?;
            }
            Some(Arg::Pair(first, second)) => {
                record(&mut sizes[0], 0, node_count(first, &b.base, ctx.node_dim)?)?;
                record(&mut sizes[1], 1, node_count(second, &b.base, ctx.node_dim)?)?;
            }
            _ => {}
        }
    }
    Ok(sizes)
}

/// Check observed counts against an established size.
pub(crate) fn check_size(size: Size, observed: [Option<usize>; 2]) -> Result<(), ConfigError> {
    for (row, seen) in observed.iter().enumerate() {
        if let Some(&n) = seen.as_ref() {
            if n != size.of_row(row) {
                return Err(ConfigError::SizeMismatch {
                    side: side_name(row),
                    expected: size.of_row(row),
                    actual: n,
                });
            }
        }
    }
    Ok(())
}

/// Size of an adjacency matrix in `adj_t` orientation, reconciled with an
/// explicit size and with the node tensors.
pub(crate) fn adjacency_size(
    (rows, cols): (usize, usize),
    explicit: Option<Size>,
    kwargs: &Kwargs,
    ctx: &CollectContext<'_>,
) -> Result<Size, ConfigError> {
    let size = Size {
        num_targets: rows,
        num_sources: cols,
    };
    if let Some(s) = explicit {
        check_size(size, [Some(s.num_sources), Some(s.num_targets)])?;
    }
    let observed = observed_sizes(kwargs, ctx, EndpointRows::for_flow(Flow::SourceToTarget))?;
    check_size(size, observed)?;
    Ok(size)
}

// ── Gathering ──────────────────────────────────────────────────────

/// Node ids an endpoint reads: one per edge, or one per bin slot with
/// `None` for padding.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Slots<'s> {
    Ids(&'s [usize]),
    Padded {
        slots: &'s [Option<usize>],
        rows: usize,
        width: usize,
    },
}

impl Slots<'_> {
    fn select(self, t: &Tensor, node_dim: usize) -> Result<Tensor, TensorError> {
        match self {
            Self::Ids(ids) => t.index_select(node_dim, ids),
            Self::Padded { slots, rows, width } => partial::split_axis(
                t.index_select_padded(node_dim, slots)?,
                node_dim,
                rows,
                width,
            ),
        }
    }

    /// Per-node ids read through the slots. Padded slots read 0.
    fn select_ids(self, ids: &[usize]) -> Result<Vec<usize>, TensorError> {
        let at = |n: usize| {
            ids.get(n).copied().ok_or(TensorError::IndexOutOfBounds {
                index: n,
                bound: ids.len(),
            })
        };
        match self {
            Self::Ids(nodes) => nodes.iter().map(|&n| at(n)).collect(),
            Self::Padded { slots, .. } => slots.iter().map(|s| s.map_or(Ok(0), at)).collect(),
        }
    }
}

/// Collect every declared parameter available from `kwargs`.
///
/// Suffixed parameters are sliced through the endpoint's `slots`: tensors
/// along `node_dim`, index arrays elementwise. A tensor pair contributes
/// the side matching the endpoint's edge-list row. Unsuffixed values are
/// borrowed unchanged. Parameters with no value are skipped; the engine
/// reports missing required ones per hook.
pub(crate) fn gather<'a, 's>(
    kwargs: &'a Kwargs,
    ctx: &CollectContext<'_>,
    rows: EndpointRows,
    slots: impl Fn(Endpoint) -> Slots<'s>,
) -> Result<ArgMap<'a>, PropagateError> {
    let mut out = ArgMap::new();
    for b in &ctx.bindings {
        if out.contains_key(&b.name) {
            continue;
        }
        let value = match (b.endpoint, kwargs.get(&b.base)) {
            (Some(e), Some(Arg::Tensor(t))) => {
                Cow::Owned(Arg::Tensor(slots(e).select(t, ctx.node_dim)?))
            }
            (Some(e), Some(Arg::Pair(first, second))) => {
                let side = if rows.of(e) == 0 { first } else { second };
                Cow::Owned(Arg::Tensor(slots(e).select(side, ctx.node_dim)?))
            }
            (Some(e), Some(Arg::Index(ids))) => Cow::Owned(Arg::Index(slots(e).select_ids(ids)?)),
            (Some(_), Some(other)) => {
                return Err(ConfigError::UnsliceableParam {
                    name: b.name.clone(),
                    kind: other.kind(),
                }
                .into())
            }
            (Some(_), None) | (None, _) => match kwargs.get(&b.name) {
                Some(v) => Cow::Borrowed(v),
                None => continue,
            },
        };
        out.insert(b.name.clone(), value);
    }
    Ok(out)
}
