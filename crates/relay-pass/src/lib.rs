//! Message-passing dispatch engine.
//!
//! A layer implements [`MessagePassing`]: it declares which hooks it
//! provides and the named parameters each hook takes. A [`Dispatcher`]
//! wraps the layer and, for every [`propagate`](Dispatcher::propagate)
//! call:
//!
//! 1. classifies the connectivity as an edge list, a sparse adjacency or a
//!    dense adjacency ([`classify`]);
//! 2. resolves an execution [`Strategy`] once per representation and caches
//!    it ([`resolve`], [`StrategyCache`]);
//! 3. collects each hook's arguments, slicing `_i`/`_j` node parameters to
//!    per-edge endpoints ([`Collector`]);
//! 4. calls the hooks and reduces messages into per-node outputs.
//!
//! Layer hooks are pure functions of their [`HookArgs`]; the dispatcher is
//! `Send + Sync` and safe to share across threads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod args;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod inspector;
pub mod layer;

pub use aggregate::{reference_aggregate, reference_partial_aggregate};
pub use args::{Adjacency, Arg, HookArgs, Kwargs, Size};
pub use collector::Collector;
pub use config::{Aggregation, DispatchConfig, Flow};
pub use dispatcher::{Dispatcher, CONSISTENCY_TOLERANCE};
pub use error::{ConfigError, HookError, PropagateError};
pub use format::{classify, reachable, resolve, Connectivity, Representation, Strategy, StrategyCache};
pub use inspector::{Capabilities, Endpoint, ParamBinding};
pub use layer::{Hook, MessagePassing, Param, Signature};
