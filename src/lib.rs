/// Model-wide settings (dtype, bound margin and minimizer configuration), loadable from JSON.
pub mod config;

/// Generation of unique node and model names.
pub mod naming;

/// Error types for the expression graph and for the model lifecycle.
pub mod error;

/// Expression graphs over f64 vectors: symbolic construction, serializable snapshots,
/// snapshot import with input substitution, and evaluation by sessions.
pub mod graph;

/// Distribution nodes: symbolic random variables whose log-densities are built
/// into the graph of the open model; and the catalog of available distributions.
pub mod distr;

/// Probabilistic models built from distribution nodes: the open/close scope, the
/// split of the components into observed and hidden nodes and the queries over it.
pub mod model;

/// Maximum likelihood fitting of the hidden parameters of an observed model.
pub mod fit;

/// Bounded numerical minimization.
pub mod optim;

pub use config::{Config, DType};

pub use error::{GraphError, ModelError};

pub use distr::{Node, Distribution, Normal, Uniform, Exponential};

pub use model::{Model, OpenModel, Target};

pub use optim::OptimizeResult;
