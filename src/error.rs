use thiserror::Error;

/// Failures raised by the execution substrate: building, importing and
/// evaluating expression graphs.
#[derive(Error, Debug)]
pub enum GraphError {

    #[error("No node named '{0}' in graph")]
    UnknownName(String),

    #[error("Node name '{0}' is already in use")]
    DuplicateName(String),

    #[error("Placeholder '{0}' was not fed a value")]
    MissingFeed(String),

    #[error("Only placeholders can be fed, but '{0}' is not a placeholder")]
    InvalidFeedTarget(String),

    #[error("Variable '{0}' was not initialized")]
    Uninitialized(String),

    #[error("Node '{0}' is not a variable")]
    NotAVariable(String),

    #[error("Incompatible operand lengths for {op}: {left} and {right}")]
    ShapeMismatch { op : &'static str, left : usize, right : usize },

    #[error("{0} requires at least one input")]
    EmptyInput(&'static str),

    #[error("{op} takes {expected} inputs, but {given} were informed")]
    Arity { op : &'static str, expected : usize, given : usize },

    #[error("{0} nodes are resolved by the session and have no evaluation of their own")]
    Unevaluable(&'static str),

    #[error("Expression '{0}' belongs to a different graph")]
    ForeignGraph(String),

    #[error("Session was closed")]
    SessionClosed,

    #[error("Graph serialization error: {0}")]
    Json(#[from] serde_json::Error),

}

/// Failures raised by the model lifecycle (open/close, observe, queries and fit).
/// Nesting and NoActiveModel are the registry failures; Graph wraps anything the
/// execution substrate raised while the model was evaluating.
#[derive(Error, Debug)]
pub enum ModelError {

    #[error("Can't nest models within each other")]
    Nesting,

    #[error("This can only be used inside a model environment")]
    NoActiveModel,

    #[error("Observed variables have to be set outside of the model block")]
    WrongScope,

    #[error("Model '{0}' has not been closed")]
    NotClosed(String),

    #[error("observed() has not been called")]
    NotObserved,

    #[error("Number of parameters ({given}) does not correspond to observed variables ({expected})")]
    ArgumentMismatch { given : usize, expected : usize },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{op} is not implemented for {kind}")]
    NotImplemented { op : &'static str, kind : &'static str },

    #[error("Optimization failed: {0}")]
    Optimizer(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

}
