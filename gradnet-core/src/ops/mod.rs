//! Operators: the math attached to graph nodes.
//!
//! An operator sees its node's inputs as one concatenated `&[f32]` in edge
//! order and writes one output buffer. Gradient formulas get the same views
//! read-only through a [`GradContext`], plus the node's accumulated output
//! gradient, and produce per-edge input contributions or flattened parameter
//! gradients.

mod combine;
mod dense;
mod elementwise;


pub use combine::Sum;
pub use dense::Dense;
pub use elementwise::{Elementwise, Identity, Map, Relu, Sigmoid, Tanh};

use crate::error::GraphError;
use crate::exec::ParallelExecutor;
use crate::graph::NodeId;
use std::fmt;
use std::path::Path;

/// Read-only view of a node's buffers handed to gradient formulas.
///
/// `inputs` and `values` are the views the operator saw during the last
/// evaluation of this node, including staged snapshots of lagged producers,
/// so gradient math replays the same step the forward pass computed.
pub struct GradContext<'a> {
    /// The node's accumulated output gradient.
    pub delta: &'a [f32],
    /// The node's concatenated input values.
    pub inputs: &'a [f32],
    /// The node's own output values.
    pub values: &'a [f32],
    /// Cumulative input lengths; edge `k` spans
    /// `input_offsets[k]..input_offsets[k + 1]` of `inputs`.
    pub input_offsets: &'a [usize],
}

impl GradContext<'_> {
    /// The input values arriving over edge `edge`.
    pub fn input_of(&self, edge: usize) -> &[f32] {
        &self.inputs[self.input_offsets[edge]..self.input_offsets[edge + 1]]
    }

    /// Offset of edge `edge` inside the concatenated input vector.
    pub fn edge_offset(&self, edge: usize) -> usize {
        self.input_offsets[edge]
    }
}

/// The math attached to a node.
///
/// Implementations must be `Sync`: the worker pool shares them across
/// threads while parallelizing a single node's loops.
pub trait Operator: fmt::Debug + Send + Sync {
    /// Short lowercase tag used in logs and weight file names.
    fn name(&self) -> &'static str;

    /// Output buffer length for the given input lengths.
    ///
    /// Called during finalization, before [`init`](Operator::init), and must
    /// not depend on state built there.
    fn output_len(&self, input_lens: &[usize]) -> Result<usize, GraphError>;

    /// One-time setup at finalization, e.g. weight allocation. Finalizing a
    /// graph twice would run this again, so implementations need not guard
    /// against re-entry.
    fn init(&mut self, input_lens: &[usize], output_len: usize) -> Result<(), GraphError> {
        let _ = (input_lens, output_len);
        Ok(())
    }

    /// Computes the node's values from its concatenated inputs.
    fn evaluate(
        &self,
        inputs: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError>;

    /// Writes `d(cost)/d(input)` for the inputs arriving over `edge` into
    /// `contribution`, given the node's output gradient in `ctx.delta`.
    fn input_gradient(
        &self,
        ctx: &GradContext<'_>,
        edge: usize,
        contribution: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError>;

    fn as_adjustable(&self) -> Option<&dyn AdjustableOperator> {
        None
    }

    fn as_adjustable_mut(&mut self) -> Option<&mut dyn AdjustableOperator> {
        None
    }

    /// Persists learned state under `dir`. Stateless operators do nothing.
    fn save(&self, dir: &Path, node: NodeId) -> Result<(), GraphError> {
        let _ = (dir, node);
        Ok(())
    }

    /// Restores state written by [`save`](Operator::save).
    fn load(&mut self, dir: &Path, node: NodeId) -> Result<(), GraphError> {
        let _ = (dir, node);
        Ok(())
    }
}

/// An operator with trainable parameters.
///
/// Parameters are exposed as one flat slice so optimizers stay agnostic of
/// their shape. Updates go either to the live parameters or into a staged
/// buffer of the same layout that [`commit_staged`] applies later; the
/// latter is what lets a mini-batch accumulate several updates before the
/// weights actually move.
///
/// [`commit_staged`]: AdjustableOperator::commit_staged
pub trait AdjustableOperator: Operator {
    /// Total number of parameters.
    fn param_len(&self) -> usize;

    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];

    /// Writes `d(cost)/d(parameter)` for every parameter, in `params` order.
    fn param_gradients(
        &self,
        ctx: &GradContext<'_>,
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError>;

    /// Deferred-update buffer with the same layout as `params`.
    fn staged_mut(&mut self) -> &mut [f32];

    /// Adds the staged buffer to the live parameters and clears it.
    fn commit_staged(&mut self);
}
