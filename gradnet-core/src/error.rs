use crate::graph::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for the GradNet engine.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum GraphError {
    #[error("{node} does not affect any declared output")]
    UnreachableNode { node: NodeId },

    #[error("zero-lag cycle detected: {}", format_cycle(.nodes))]
    ZeroLagCycle { nodes: Vec<NodeId> },

    #[error("{node} is a placeholder that was never replaced")]
    PlaceholderNotReplaced { node: NodeId },

    #[error("{node} is not a placeholder")]
    NotAPlaceholder { node: NodeId },

    #[error("{node} does not exist in this graph")]
    UnknownNode { node: NodeId },

    #[error("graph is already finalized; {operation} is rejected")]
    Finalized { operation: String },

    #[error("graph must be finalized before {operation}")]
    NotFinalized { operation: String },

    #[error("{node} is not an input node")]
    NotAnInput { node: NodeId },

    #[error("{node} has no adjustable parameters")]
    NotAdjustable { node: NodeId },

    #[error("length mismatch at {node} during {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        node: NodeId,
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("target vector has length {actual}, but the declared outputs total {expected}")]
    TargetLength { expected: usize, actual: usize },

    #[error("input vector has length {actual}, but the declared inputs total {expected}")]
    InputLength { expected: usize, actual: usize },

    #[error("node buffers must have a nonzero length")]
    ZeroLength,

    #[error("{node} is declared as an output more than once")]
    DuplicateOutput { node: NodeId },

    #[error("no output nodes are declared")]
    NoOutputs,

    #[error("incompatible input lengths {lens:?} for operation {operation}")]
    IncompatibleInputs { operation: String, lens: Vec<usize> },

    #[error("invalid initialization parameters: {reason}")]
    InvalidInit { reason: String },

    #[error("delay buffer is full ({capacity} snapshots)")]
    DelayOverflow { capacity: usize },

    #[error("delay buffer is empty")]
    DelayUnderflow,

    #[error("failure at {node} during {operation}: {source}")]
    NodeFailure {
        node: NodeId,
        operation: String,
        #[source]
        source: Box<GraphError>,
    },

    #[error("could not build the worker pool: {reason}")]
    ThreadPool { reason: String },

    #[error("I/O failure on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid weight file {path}: {reason}")]
    InvalidWeightFile { path: PathBuf, reason: String },

    #[error("data supplier has no samples")]
    EmptySupplier,
}

impl GraphError {
    /// Wraps an error with the identity of the node it surfaced at.
    pub(crate) fn at_node(self, node: NodeId, operation: &str) -> GraphError {
        GraphError::NodeFailure {
            node,
            operation: operation.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn io(path: &std::path::Path, error: std::io::Error) -> GraphError {
        GraphError::Io {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

fn format_cycle(nodes: &[NodeId]) -> String {
    let mut parts: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    if let Some(first) = nodes.first() {
        // Repeat the origin so the printed path visibly closes the loop.
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}
