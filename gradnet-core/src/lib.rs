//! Dependency-graph evaluation and gradient propagation engine.
//!
//! A [`Graph`] wires value buffers together through [`Operator`]s, brings
//! them up to date with per-node memoization and propagates cost gradients
//! back through the same wiring, including lagged edges that cross time
//! steps.

pub mod cost;
pub mod error;
pub mod eval;
pub mod exec;
pub mod graph;
pub mod init;
pub mod ops;
pub mod optim;
mod persist;


pub use cost::{CostFunction, CrossEntropy, MeanSquaredError};
pub use error::GraphError;
pub use eval::grad_check::{check_parameter_gradients, GradCheckError};
pub use exec::{ExecutorConfig, ParallelExecutor};
pub use graph::{Graph, NodeId, PassState};
pub use init::InitScheme;
pub use ops::{
    AdjustableOperator, Dense, Elementwise, GradContext, Identity, Map, Operator, Relu, Sigmoid,
    Sum, Tanh,
};
pub use optim::{Optimizer, Sgd};
