//! Connectivity classification and execution-strategy resolution.
//!
//! [`classify`] maps a [`Connectivity`] to one of three
//! [`Representation`]s. [`resolve`] picks the [`Strategy`] a layer uses for
//! a representation and records it in the dispatcher's [`StrategyCache`],
//! after which the answer never changes for that dispatcher.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use relay_core::{IndexTensor, SparseTensor, Tensor};
use tracing::debug;

use crate::error::{ConfigError, PropagateError};
use crate::inspector::Capabilities;

// ── Connectivity ───────────────────────────────────────────────────

/// A graph's connectivity as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Connectivity {
    /// Integer matrix: a `[2, E]` edge list, or any other rank-2 integer
    /// matrix read as a dense adjacency.
    Index(IndexTensor),
    /// Sparse adjacency in `adj_t` orientation (rows are targets).
    Sparse(SparseTensor),
    /// Dense adjacency in `adj_t` orientation.
    Dense(Tensor),
}

impl From<IndexTensor> for Connectivity {
    fn from(t: IndexTensor) -> Self {
        Self::Index(t)
    }
}

impl From<SparseTensor> for Connectivity {
    fn from(t: SparseTensor) -> Self {
        Self::Sparse(t)
    }
}

impl From<Tensor> for Connectivity {
    fn from(t: Tensor) -> Self {
        Self::Dense(t)
    }
}

/// Structural class of a [`Connectivity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Representation {
    /// `[2, E]` edge list.
    EdgeIndex,
    /// Sparse adjacency matrix.
    SparseAdj,
    /// Dense adjacency matrix.
    DenseAdj,
}

impl Representation {
    /// All representations, in cache-slot order.
    pub const ALL: [Representation; 3] = [Self::EdgeIndex, Self::SparseAdj, Self::DenseAdj];

    fn slot(self) -> usize {
        match self {
            Self::EdgeIndex => 0,
            Self::SparseAdj => 1,
            Self::DenseAdj => 2,
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EdgeIndex => "edge_index",
            Self::SparseAdj => "sparse_adj",
            Self::DenseAdj => "dense_adj",
        })
    }
}

/// Classify connectivity by structure alone.
///
/// Total over well-formed values: every rank-2 value maps to exactly one
/// representation. Anything else is [`PropagateError::InvalidConnectivity`].
pub fn classify(connectivity: &Connectivity) -> Result<Representation, PropagateError> {
    match connectivity {
        Connectivity::Index(t) if t.is_edge_list() => Ok(Representation::EdgeIndex),
        Connectivity::Index(t) if t.rank() == 2 => Ok(Representation::DenseAdj),
        Connectivity::Index(t) => Err(PropagateError::InvalidConnectivity {
            reason: format!("integer connectivity must be rank 2, got {:?}", t.shape()),
        }),
        Connectivity::Sparse(_) => Ok(Representation::SparseAdj),
        Connectivity::Dense(t) if t.rank() == 2 => Ok(Representation::DenseAdj),
        Connectivity::Dense(t) => Err(PropagateError::InvalidConnectivity {
            reason: format!("dense adjacency must be rank 2, got {:?}", t.shape()),
        }),
    }
}

// ── Strategy ───────────────────────────────────────────────────────

/// How a propagation call is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// A single hook consumes the whole connectivity.
    Fused,
    /// `message` per edge, then `aggregate`.
    Sparse,
    /// `partial_message` and `partial_aggregate` per neighbourhood bin.
    Partial,
}

impl Strategy {
    fn tag(self) -> u8 {
        match self {
            Self::Fused => 1,
            Self::Sparse => 2,
            Self::Partial => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Fused),
            2 => Some(Self::Sparse),
            3 => Some(Self::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fused => "fused",
            Self::Sparse => "sparse",
            Self::Partial => "partial",
        })
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fused" => Ok(Self::Fused),
            "sparse" => Ok(Self::Sparse),
            "partial" => Ok(Self::Partial),
            other => Err(ConfigError::InvalidFormat {
                value: other.to_string(),
            }),
        }
    }
}

// ── StrategyCache ──────────────────────────────────────────────────

/// Per-dispatcher memo of the strategy chosen for each representation.
///
/// One atomic slot per representation; 0 means unresolved. Slots are
/// written once with compare-exchange, so concurrent callers agree on the
/// first stored answer.
#[derive(Debug, Default)]
pub struct StrategyCache {
    slots: [AtomicU8; 3],
}

impl StrategyCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached strategy, if resolved.
    pub fn get(&self, repr: Representation) -> Option<Strategy> {
        Strategy::from_tag(self.slots[repr.slot()].load(Ordering::Acquire))
    }

    /// Store `strategy` unless a value is already present; returns the
    /// value that ends up cached.
    pub fn insert(&self, repr: Representation, strategy: Strategy) -> Strategy {
        match self.slots[repr.slot()].compare_exchange(
            0,
            strategy.tag(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => strategy,
            Err(existing) => Strategy::from_tag(existing).unwrap_or(strategy),
        }
    }
}

// ── Resolution ─────────────────────────────────────────────────────

/// Whether `strategy` can execute `repr` with the given capabilities.
pub fn reachable(repr: Representation, strategy: Strategy, caps: &Capabilities) -> bool {
    match (repr, strategy) {
        (Representation::EdgeIndex, Strategy::Sparse) => true,
        (Representation::EdgeIndex, _) => false,
        (Representation::SparseAdj, Strategy::Fused) => caps.supports_fused_sparse(),
        (Representation::SparseAdj, Strategy::Sparse) => caps.supports_sparse(),
        (Representation::DenseAdj, Strategy::Fused) => caps.supports_fused_dense(),
        (Representation::DenseAdj, Strategy::Sparse) => false,
        (_, Strategy::Partial) => caps.supports_partial(),
    }
}

fn select(
    repr: Representation,
    caps: &Capabilities,
    explicit: Option<Strategy>,
) -> Result<Strategy, PropagateError> {
    let unsupported = || PropagateError::UnsupportedFormat {
        representation: repr,
        requested: explicit,
    };
    if repr == Representation::EdgeIndex {
        return Ok(Strategy::Sparse);
    }
    if let Some(strategy) = explicit {
        return if reachable(repr, strategy, caps) {
            Ok(strategy)
        } else {
            Err(unsupported())
        };
    }
    let preference: &[Strategy] = match repr {
        Representation::SparseAdj => &[Strategy::Fused, Strategy::Sparse, Strategy::Partial],
        _ => &[Strategy::Fused, Strategy::Partial],
    };
    preference
        .iter()
        .copied()
        .find(|&s| reachable(repr, s, caps))
        .ok_or_else(unsupported)
}

/// Resolve and cache the strategy for `repr`.
///
/// A cached answer is returned as-is, without consulting `caps` again.
/// Edge lists always use [`Strategy::Sparse`]. An explicit format must be
/// reachable; otherwise adjacency matrices prefer `fused`, then `sparse`
/// (sparse matrices only), then `partial`. Failures are not cached.
pub fn resolve(
    repr: Representation,
    caps: &Capabilities,
    explicit: Option<Strategy>,
    cache: &StrategyCache,
) -> Result<Strategy, PropagateError> {
    if let Some(strategy) = cache.get(repr) {
        return Ok(strategy);
    }
    let strategy = cache.insert(repr, select(repr, caps, explicit)?);
    debug!(representation = %repr, strategy = %strategy, "resolved propagation strategy");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Aggregation;
    use crate::layer::{Hook, Signature};

    fn caps(hooks: &[Hook], aggr: Aggregation) -> Capabilities {
        let sigs: Vec<Signature> = hooks.iter().map(|&h| Signature::new(h)).collect();
        Capabilities::inspect(&sigs, aggr).unwrap()
    }

    #[test]
    fn classification_is_total_and_exclusive() {
        let edge_list = IndexTensor::edge_index(&[0, 1], &[1, 0]).unwrap();
        let int_matrix = IndexTensor::new(&[3, 3], vec![0; 9]).unwrap();
        let int_vector = IndexTensor::new(&[4], vec![0; 4]).unwrap();
        let sparse = SparseTensor::empty((2, 2));
        let dense = Tensor::zeros(&[2, 2]).unwrap();
        let cube = Tensor::zeros(&[2, 2, 2]).unwrap();

        assert_eq!(classify(&edge_list.into()), Ok(Representation::EdgeIndex));
        assert_eq!(classify(&int_matrix.into()), Ok(Representation::DenseAdj));
        assert_eq!(classify(&sparse.into()), Ok(Representation::SparseAdj));
        assert_eq!(classify(&dense.into()), Ok(Representation::DenseAdj));
        assert!(matches!(
            classify(&int_vector.into()),
            Err(PropagateError::InvalidConnectivity { .. })
        ));
        assert!(matches!(
            classify(&cube.into()),
            Err(PropagateError::InvalidConnectivity { .. })
        ));
    }

    #[test]
    fn edge_lists_always_resolve_sparse() {
        let c = caps(&[Hook::SparseMessageAndAggregate], Aggregation::None);
        let cache = StrategyCache::new();
        let s = resolve(Representation::EdgeIndex, &c, Some(Strategy::Fused), &cache);
        assert_eq!(s, Ok(Strategy::Sparse));
    }

    #[test]
    fn sparse_prefers_fused_then_sparse_then_partial() {
        let all = caps(
            &[Hook::SparseMessageAndAggregate, Hook::Message, Hook::PartialMessage],
            Aggregation::Add,
        );
        let msg = caps(&[Hook::Message, Hook::PartialMessage], Aggregation::Add);
        let part = caps(&[Hook::PartialMessage], Aggregation::Add);
        for (c, want) in [
            (&all, Strategy::Fused),
            (&msg, Strategy::Sparse),
            (&part, Strategy::Partial),
        ] {
            let cache = StrategyCache::new();
            assert_eq!(resolve(Representation::SparseAdj, c, None, &cache), Ok(want));
        }
    }

    #[test]
    fn dense_never_resolves_sparse() {
        let c = caps(&[Hook::Message], Aggregation::Add);
        let cache = StrategyCache::new();
        assert!(matches!(
            resolve(Representation::DenseAdj, &c, None, &cache),
            Err(PropagateError::UnsupportedFormat { requested: None, .. })
        ));
        assert!(matches!(
            resolve(Representation::DenseAdj, &c, Some(Strategy::Sparse), &cache),
            Err(PropagateError::UnsupportedFormat {
                requested: Some(Strategy::Sparse),
                ..
            })
        ));
        assert_eq!(cache.get(Representation::DenseAdj), None);
    }

    #[test]
    fn message_without_aggregation_is_not_sparse_capable() {
        let c = caps(&[Hook::Message], Aggregation::None);
        assert!(!c.supports_sparse());
        let c = caps(&[Hook::Message, Hook::Aggregate], Aggregation::None);
        assert!(c.supports_sparse());
    }

    #[test]
    fn explicit_format_overrides_preference() {
        let c = caps(&[Hook::SparseMessageAndAggregate, Hook::Message], Aggregation::Add);
        let cache = StrategyCache::new();
        assert_eq!(
            resolve(Representation::SparseAdj, &c, Some(Strategy::Sparse), &cache),
            Ok(Strategy::Sparse)
        );
    }

    #[test]
    fn cached_answer_survives_different_capabilities() {
        let fused = caps(&[Hook::SparseMessageAndAggregate], Aggregation::Add);
        let partial_only = caps(&[Hook::PartialMessage], Aggregation::Add);
        let cache = StrategyCache::new();
        assert_eq!(
            resolve(Representation::SparseAdj, &fused, None, &cache),
            Ok(Strategy::Fused)
        );
        assert_eq!(
            resolve(Representation::SparseAdj, &partial_only, None, &cache),
            Ok(Strategy::Fused)
        );
        assert_eq!(cache.get(Representation::EdgeIndex), None);
    }

    #[test]
    fn first_writer_wins() {
        let cache = StrategyCache::new();
        assert_eq!(cache.insert(Representation::DenseAdj, Strategy::Partial), Strategy::Partial);
        assert_eq!(cache.insert(Representation::DenseAdj, Strategy::Fused), Strategy::Partial);
        assert_eq!(cache.get(Representation::DenseAdj), Some(Strategy::Partial));
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("fused".parse::<Strategy>(), Ok(Strategy::Fused));
        assert!("dense".parse::<Strategy>().is_err());
    }
}
