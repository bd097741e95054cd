//! Optimizers turning accumulated gradients into weight updates.

mod sgd;

#[cfg(test)]
mod sgd_test;

pub use sgd::Sgd;

use crate::error::GraphError;
use crate::graph::NodeId;
use std::fmt;

/// A rule converting parameter gradients into parameter deltas.
///
/// The adjust pass calls [`run`](Optimizer::run) once per adjustable node
/// with that node's flattened gradients. `target` is either the node's live
/// parameters or a staged update buffer, depending on whether the caller
/// deferred the update; implementations must only add their step to it and
/// keep per-node state (momentum and the like) keyed on the node id.
pub trait Optimizer: fmt::Debug + Send {
    fn run(
        &mut self,
        node: NodeId,
        gradients: &[f32],
        target: &mut [f32],
        learning_rate: f32,
    ) -> Result<(), GraphError>;
}
