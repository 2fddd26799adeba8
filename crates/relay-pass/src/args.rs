//! Named arguments flowing into and through a propagation call.
//!
//! Callers pass [`Kwargs`]. Collectors derive a per-call argument set that
//! borrows the caller's values wherever they are used unchanged, and each
//! hook receives a [`HookArgs`] view restricted to the parameters it
//! declared.

use std::borrow::Cow;

use indexmap::IndexMap;
use relay_core::{SparseTensor, Tensor};

use crate::config::Aggregation;
use crate::error::HookError;
use crate::layer::Hook;

/// A named argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// A numeric tensor.
    Tensor(Tensor),
    /// Bipartite node features: `(row 0 side, row 1 side)` of the edge list.
    /// Under the default flow that is `(sources, targets)`.
    Pair(Tensor, Tensor),
    /// Node or edge ids.
    Index(Vec<usize>),
    /// A count.
    Count(usize),
    /// A scalar.
    Scalar(f32),
    /// A sparse matrix.
    Sparse(SparseTensor),
}

impl Arg {
    /// Human-readable kind of the value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tensor(_) => "tensor",
            Self::Pair(..) => "tensor pair",
            Self::Index(_) => "index array",
            Self::Count(_) => "count",
            Self::Scalar(_) => "scalar",
            Self::Sparse(_) => "sparse matrix",
        }
    }
}

impl From<Tensor> for Arg {
    fn from(t: Tensor) -> Self {
        Self::Tensor(t)
    }
}

impl From<(Tensor, Tensor)> for Arg {
    fn from((a, b): (Tensor, Tensor)) -> Self {
        Self::Pair(a, b)
    }
}

impl From<Vec<usize>> for Arg {
    fn from(ids: Vec<usize>) -> Self {
        Self::Index(ids)
    }
}

impl From<usize> for Arg {
    fn from(n: usize) -> Self {
        Self::Count(n)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Self::Scalar(v)
    }
}

impl From<SparseTensor> for Arg {
    fn from(s: SparseTensor) -> Self {
        Self::Sparse(s)
    }
}

/// The caller's named arguments.
///
/// ```
/// use relay_pass::{Arg, Kwargs};
/// use relay_core::Tensor;
///
/// let kwargs = Kwargs::new()
///     .with("x", Tensor::ones(&[3, 2]).unwrap())
///     .with("alpha", 0.5f32);
/// assert!(matches!(kwargs.get("alpha"), Some(Arg::Scalar(_))));
/// assert_eq!(kwargs.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Kwargs {
    values: IndexMap<String, Arg>,
}

impl Kwargs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up an argument.
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.values.get(name)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arguments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Node counts of the two sides of an edge list.
///
/// `num_sources` counts the nodes addressed by row 0, `num_targets` those
/// addressed by row 1. For adjacency matrices (`adj_t`) targets are rows
/// and sources are columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    /// Nodes on the receiving side under the default flow.
    pub num_targets: usize,
    /// Nodes on the sending side under the default flow.
    pub num_sources: usize,
}

impl Size {
    /// Size of a graph whose two sides coincide.
    pub fn square(num_nodes: usize) -> Self {
        Self {
            num_targets: num_nodes,
            num_sources: num_nodes,
        }
    }

    /// Count for edge-list row `row` (0 = sources, 1 = targets).
    pub fn of_row(&self, row: usize) -> usize {
        if row == 0 {
            self.num_sources
        } else {
            self.num_targets
        }
    }
}

/// Adjacency handed to fused hooks as `adj_t`.
#[derive(Clone, Debug)]
pub enum Adjacency<'a> {
    /// Sparse `adj_t`.
    Sparse(&'a SparseTensor),
    /// Dense `adj_t`.
    Dense(Cow<'a, Tensor>),
}

impl Adjacency<'_> {
    pub(crate) fn reborrow(&self) -> Adjacency<'_> {
        match self {
            Self::Sparse(s) => Adjacency::Sparse(*s),
            Self::Dense(d) => Adjacency::Dense(Cow::Borrowed(d.as_ref())),
        }
    }
}

/// Arguments supplied to one hook invocation.
///
/// Holds exactly the parameters the hook declared (that were available),
/// plus the call context: the node axis and the configured aggregation.
#[derive(Clone, Debug)]
pub struct HookArgs<'a> {
    hook: Hook,
    node_dim: usize,
    aggr: Aggregation,
    values: IndexMap<String, Cow<'a, Arg>>,
    adj_t: Option<Adjacency<'a>>,
}

impl<'a> HookArgs<'a> {
    /// An empty argument set for calling `hook` directly.
    pub fn new(hook: Hook, node_dim: usize, aggr: Aggregation) -> Self {
        Self {
            hook,
            node_dim,
            aggr,
            values: IndexMap::new(),
            adj_t: None,
        }
    }

    /// Add an owned argument.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.values.insert(name.into(), Cow::Owned(value.into()));
        self
    }

    /// Attach a sparse `adj_t`.
    #[must_use]
    pub fn with_sparse_adj(mut self, adj_t: &'a SparseTensor) -> Self {
        self.adj_t = Some(Adjacency::Sparse(adj_t));
        self
    }

    /// Attach a dense `adj_t`.
    #[must_use]
    pub fn with_dense_adj(mut self, adj_t: &'a Tensor) -> Self {
        self.adj_t = Some(Adjacency::Dense(Cow::Borrowed(adj_t)));
        self
    }

    pub(crate) fn insert(&mut self, name: String, value: Cow<'a, Arg>) {
        self.values.insert(name, value);
    }

    pub(crate) fn set_adj(&mut self, adj: Adjacency<'a>) {
        self.adj_t = Some(adj);
    }

    /// The hook these arguments are for.
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Axis of node and edge tensors.
    pub fn node_dim(&self) -> usize {
        self.node_dim
    }

    /// The dispatcher's configured aggregation.
    pub fn aggregation(&self) -> Aggregation {
        self.aggr
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || (name == "adj_t" && self.adj_t.is_some())
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.values.get(name).map(|v| &**v)
    }

    fn required(&self, name: &str) -> Result<&Arg, HookError> {
        self.get(name).ok_or_else(|| HookError::MissingArgument {
            name: name.to_string(),
        })
    }

    fn wrong(name: &str, expected: &'static str) -> HookError {
        HookError::WrongArgumentType {
            name: name.to_string(),
            expected,
        }
    }

    /// A required tensor argument.
    pub fn tensor(&self, name: &str) -> Result<&Tensor, HookError> {
        match self.required(name)? {
            Arg::Tensor(t) => Ok(t),
            _ => Err(Self::wrong(name, "tensor")),
        }
    }

    /// An optional tensor argument.
    pub fn opt_tensor(&self, name: &str) -> Result<Option<&Tensor>, HookError> {
        match self.get(name) {
            None => Ok(None),
            Some(Arg::Tensor(t)) => Ok(Some(t)),
            Some(_) => Err(Self::wrong(name, "tensor")),
        }
    }

    /// A required index array.
    pub fn index(&self, name: &str) -> Result<&[usize], HookError> {
        match self.required(name)? {
            Arg::Index(ids) => Ok(ids.as_slice()),
            _ => Err(Self::wrong(name, "index array")),
        }
    }

    /// An optional index array.
    pub fn opt_index(&self, name: &str) -> Result<Option<&[usize]>, HookError> {
        match self.get(name) {
            None => Ok(None),
            Some(Arg::Index(ids)) => Ok(Some(ids.as_slice())),
            Some(_) => Err(Self::wrong(name, "index array")),
        }
    }

    /// A required count.
    pub fn count(&self, name: &str) -> Result<usize, HookError> {
        match self.required(name)? {
            Arg::Count(n) => Ok(*n),
            _ => Err(Self::wrong(name, "count")),
        }
    }

    /// An optional count.
    pub fn opt_count(&self, name: &str) -> Result<Option<usize>, HookError> {
        match self.get(name) {
            None => Ok(None),
            Some(Arg::Count(n)) => Ok(Some(*n)),
            Some(_) => Err(Self::wrong(name, "count")),
        }
    }

    /// A required scalar.
    pub fn scalar(&self, name: &str) -> Result<f32, HookError> {
        match self.required(name)? {
            Arg::Scalar(v) => Ok(*v),
            _ => Err(Self::wrong(name, "scalar")),
        }
    }

    /// The sparse `adj_t` of a fused call.
    pub fn sparse_adj_t(&self) -> Result<&SparseTensor, HookError> {
        match &self.adj_t {
            Some(Adjacency::Sparse(s)) => Ok(*s),
            Some(Adjacency::Dense(_)) => Err(Self::wrong("adj_t", "sparse matrix")),
            None => Err(HookError::MissingArgument {
                name: "adj_t".into(),
            }),
        }
    }

    /// The dense `adj_t` of a fused call.
    pub fn dense_adj_t(&self) -> Result<&Tensor, HookError> {
        match &self.adj_t {
            Some(Adjacency::Dense(d)) => Ok(d.as_ref()),
            Some(Adjacency::Sparse(_)) => Err(Self::wrong("adj_t", "dense matrix")),
            None => Err(HookError::MissingArgument {
                name: "adj_t".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kwargs_replace_in_place() {
        let mut kw = Kwargs::new().with("a", 1usize).with("b", 2.0f32);
        kw.insert("a", vec![3usize]);
        let names: Vec<_> = kw.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(kw.get("a"), Some(&Arg::Index(vec![3])));
    }

    #[test]
    fn typed_accessors_report_mismatches() {
        let args = HookArgs::new(Hook::Message, 0, Aggregation::Add)
            .with("x_j", Tensor::ones(&[2]).unwrap())
            .with("n", 4usize);
        assert!(args.tensor("x_j").is_ok());
        assert_eq!(args.count("n"), Ok(4));
        assert_eq!(args.opt_count("missing"), Ok(None));
        assert_eq!(
            args.tensor("n"),
            Err(HookError::WrongArgumentType {
                name: "n".into(),
                expected: "tensor"
            })
        );
        assert_eq!(
            args.index("ptr"),
            Err(HookError::MissingArgument { name: "ptr".into() })
        );
        assert!(matches!(
            args.sparse_adj_t(),
            Err(HookError::MissingArgument { .. })
        ));
    }

    #[test]
    fn adjacency_accessors_check_kind() {
        let dense = Tensor::zeros(&[2, 2]).unwrap();
        let args = HookArgs::new(Hook::DenseMessageAndAggregate, 0, Aggregation::Add)
            .with_dense_adj(&dense);
        assert!(args.contains("adj_t"));
        assert!(args.dense_adj_t().is_ok());
        assert!(matches!(
            args.sparse_adj_t(),
            Err(HookError::WrongArgumentType { .. })
        ));
    }

    #[test]
    fn size_rows() {
        let s = Size {
            num_targets: 2,
            num_sources: 5,
        };
        assert_eq!(s.of_row(0), 5);
        assert_eq!(s.of_row(1), 2);
        assert_eq!(Size::square(3), Size { num_targets: 3, num_sources: 3 });
    }

    #[test]
    fn arg_kinds() {
        assert_eq!(Arg::from(Tensor::zeros(&[1]).unwrap()).kind(), "tensor");
        assert_eq!(Arg::from(vec![0usize, 1]).kind(), "index array");
        assert_eq!(Arg::from(3usize).kind(), "count");
        assert_eq!(Arg::from(SparseTensor::empty((1, 1))).kind(), "sparse matrix");
    }
}
