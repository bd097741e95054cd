//! Node arena and graph construction.
//!
//! A [`Graph`] owns every node, the packed buffer groups behind them, and the
//! worker pool. Nodes are wired up through [`NodeId`] handles; once the
//! topology is complete, [`Graph::finalize`] validates it, packs the buffers
//! and locks the structure. The four passes (evaluate, accumulate gradients,
//! adjust weights, commit weights) live in [`crate::eval`].

pub(crate) mod delay;
pub(crate) mod group;
pub(crate) mod node;
pub(crate) mod status;
mod validate;

#[cfg(test)]
mod group_test;

pub use node::NodeId;
pub use status::PassState;

use crate::cost::CostFunction;
use crate::error::GraphError;
use crate::exec::{ExecutorConfig, ParallelExecutor};
use crate::graph::group::NodeGroup;
use crate::graph::node::{InputLayout, Node};
use crate::ops::Operator;
use log::trace;
use std::collections::HashSet;

/// A dependency graph of value buffers connected by operators.
///
/// Construction is a two-phase affair: wire nodes up with the `add_*` and
/// `replace` methods, then call [`finalize`](Graph::finalize) to validate the
/// topology and allocate the packed buffers. After finalization the structure
/// is frozen; only values, gradients and weights change.
#[derive(Debug)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) groups: Vec<NodeGroup>,
    input_nodes: Vec<NodeId>,
    output_nodes: Vec<NodeId>,
    /// Nodes whose outgoing edges are lagged, in id order.
    pub(crate) lagged: Vec<NodeId>,
    pub(crate) cost_function: Option<Box<dyn CostFunction>>,
    pub(crate) pool: Option<ParallelExecutor>,
    executor_config: ExecutorConfig,
    finalized: bool,
    /// Set during gradient accumulation so evaluation replays the current
    /// step instead of advancing the delay lines.
    pub(crate) computing_gradients: bool,
    /// Completed forward time steps, only advanced by graphs with lags.
    pub(crate) steps: u64,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            groups: Vec::new(),
            input_nodes: Vec::new(),
            output_nodes: Vec::new(),
            lagged: Vec::new(),
            cost_function: None,
            pool: None,
            executor_config: ExecutorConfig::default(),
            finalized: false,
            computing_gradients: false,
            steps: 0,
        }
    }

    /// Overrides the worker pool configuration used at finalization.
    pub fn set_executor_config(&mut self, config: ExecutorConfig) -> Result<(), GraphError> {
        self.check_not_finalized("set_executor_config")?;
        self.executor_config = config;
        Ok(())
    }

    /// Adds a node whose values are supplied from outside the graph.
    pub fn add_input(&mut self, len: usize) -> Result<NodeId, GraphError> {
        self.check_not_finalized("add_input")?;
        if len == 0 {
            return Err(GraphError::ZeroLength);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::input(len));
        self.input_nodes.push(id);
        trace!("added input {} (len {})", id, len);
        Ok(id)
    }

    /// Adds a placeholder of known length to be filled in by [`replace`].
    ///
    /// Placeholders make cyclic wiring possible: create the placeholder,
    /// wire consumers against it, then replace it with the real operator
    /// once its own inputs exist.
    ///
    /// [`replace`]: Graph::replace
    pub fn add_placeholder(&mut self, len: usize) -> Result<NodeId, GraphError> {
        self.check_not_finalized("add_placeholder")?;
        if len == 0 {
            return Err(GraphError::ZeroLength);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::placeholder(len));
        trace!("added placeholder {} (len {})", id, len);
        Ok(id)
    }

    /// Adds an operator node fed by `inputs`, in the given edge order.
    ///
    /// The node's buffer length is derived from the operator at
    /// finalization, so operators whose output size depends on their inputs
    /// (which may include later-replaced placeholders) need no forward
    /// declaration.
    pub fn add_node(
        &mut self,
        operator: Box<dyn Operator>,
        inputs: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        self.check_not_finalized("add_node")?;
        for &input in inputs {
            self.check_known(input)?;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::with_operator(operator, inputs.to_vec()));
        for (edge, &input) in inputs.iter().enumerate() {
            self.nodes[input.0].consumers.push((id, edge));
        }
        trace!("added {} ({} inputs)", id, inputs.len());
        Ok(id)
    }

    /// Substitutes a real operator for a placeholder created earlier.
    pub fn replace(
        &mut self,
        placeholder: NodeId,
        operator: Box<dyn Operator>,
        inputs: &[NodeId],
    ) -> Result<(), GraphError> {
        self.check_not_finalized("replace")?;
        self.check_known(placeholder)?;
        for &input in inputs {
            self.check_known(input)?;
        }
        let node = &mut self.nodes[placeholder.0];
        if !node.placeholder {
            return Err(GraphError::NotAPlaceholder { node: placeholder });
        }
        node.placeholder = false;
        node.operator = Some(operator);
        node.inputs = inputs.to_vec();
        for (edge, &input) in inputs.iter().enumerate() {
            self.nodes[input.0].consumers.push((placeholder, edge));
        }
        trace!("replaced placeholder {}", placeholder);
        Ok(())
    }

    /// Delays every outgoing edge of `node` by `lag` time steps.
    ///
    /// A lag of zero restores ordinary same-step edges. Lagged edges are
    /// exempt from cycle validation, which is what makes recurrent wiring
    /// legal.
    pub fn set_delay(&mut self, node: NodeId, lag: usize) -> Result<(), GraphError> {
        self.check_not_finalized("set_delay")?;
        self.check_known(node)?;
        self.nodes[node.0].lag = lag;
        Ok(())
    }

    /// Declares which nodes the evaluation pass must drive, in output order.
    ///
    /// The concatenation of these nodes' buffers, in this order, is what the
    /// cost function sees. Calling this again replaces the previous list.
    pub fn set_outputs(&mut self, outputs: &[NodeId]) -> Result<(), GraphError> {
        self.check_not_finalized("set_outputs")?;
        for &output in outputs {
            self.check_known(output)?;
        }
        self.output_nodes = outputs.to_vec();
        Ok(())
    }

    /// Writes the values of an input node and marks it and everything
    /// downstream of it stale.
    pub fn set_input(&mut self, node: NodeId, values: &[f32]) -> Result<(), GraphError> {
        self.check_finalized("set_input")?;
        self.check_known(node)?;
        if !self.nodes[node.0].is_input {
            return Err(GraphError::NotAnInput { node });
        }
        let expected = self.nodes[node.0].len;
        if values.len() != expected {
            return Err(GraphError::DimensionMismatch {
                node,
                expected,
                actual: values.len(),
                operation: "set_input".to_string(),
            });
        }
        self.value_slice_mut(node).copy_from_slice(values);
        self.cascade_stale(&[node]);
        Ok(())
    }

    /// Marks a node and everything downstream of it for recomputation.
    pub fn mark_stale(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.check_finalized("mark_stale")?;
        self.check_known(node)?;
        self.cascade_stale(&[node]);
        Ok(())
    }

    /// The node's current values. Meaningful once the node was evaluated.
    pub fn value(&self, node: NodeId) -> Result<&[f32], GraphError> {
        self.check_finalized("value")?;
        self.check_known(node)?;
        Ok(self.value_slice(node))
    }

    /// The node's accumulated gradient.
    ///
    /// Nodes outside every parameter's downstream cone carry no gradient and
    /// yield an empty slice.
    pub fn delta(&self, node: NodeId) -> Result<&[f32], GraphError> {
        self.check_finalized("delta")?;
        self.check_known(node)?;
        Ok(self.delta_slice(node))
    }

    /// Buffer length of a node. Zero for operator nodes until finalization.
    pub fn node_len(&self, node: NodeId) -> Result<usize, GraphError> {
        self.check_known(node)?;
        Ok(self.nodes[node.0].len)
    }

    pub fn state(&self, node: NodeId) -> Result<PassState, GraphError> {
        self.check_known(node)?;
        Ok(self.nodes[node.0].status.state())
    }

    /// How many times the node's values have been computed.
    pub fn generation(&self, node: NodeId) -> Result<u64, GraphError> {
        self.check_known(node)?;
        Ok(self.nodes[node.0].status.generation())
    }

    /// The live parameters of an adjustable node.
    pub fn parameters(&self, node: NodeId) -> Result<&[f32], GraphError> {
        self.check_finalized("parameters")?;
        self.check_known(node)?;
        let adjustable = self.nodes[node.0]
            .operator
            .as_deref()
            .and_then(|op| op.as_adjustable())
            .ok_or(GraphError::NotAdjustable { node })?;
        Ok(adjustable.params())
    }

    /// Mutable access to an adjustable node's parameters.
    ///
    /// The node and everything downstream are marked stale, since the caller
    /// is presumed to change the weights.
    pub fn parameters_mut(&mut self, node: NodeId) -> Result<&mut [f32], GraphError> {
        self.check_finalized("parameters_mut")?;
        self.check_known(node)?;
        if self.adjustable(node).is_none() {
            return Err(GraphError::NotAdjustable { node });
        }
        self.cascade_stale(&[node]);
        let adjustable = self.nodes[node.0]
            .operator
            .as_deref_mut()
            .and_then(|op| op.as_adjustable_mut())
            .expect("adjustable checked above");
        Ok(adjustable.params_mut())
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.input_nodes
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.output_nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Completed time steps. Stays at zero for graphs without lagged edges.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Evaluates the cost function over the declared outputs.
    ///
    /// # Panics
    ///
    /// Panics if an output node has not been evaluated for the current
    /// inputs.
    pub fn cost(&self, targets: &[f32]) -> Result<f32, GraphError> {
        self.check_finalized("cost")?;
        let expected = self.output_len();
        if targets.len() != expected {
            return Err(GraphError::TargetLength {
                expected,
                actual: targets.len(),
            });
        }
        for &output in &self.output_nodes {
            assert!(
                !self.nodes[output.0].status.requires_evaluation(),
                "cost requires an evaluated graph ({} is {:?})",
                output,
                self.nodes[output.0].status.state()
            );
        }
        let outputs = self.concat_outputs();
        let cost_function = self
            .cost_function
            .as_ref()
            .expect("finalized graphs hold a cost function");
        Ok(cost_function.cost(&outputs, targets, self.pool()))
    }

    // ---- crate-internal helpers ----

    pub(crate) fn check_known(&self, node: NodeId) -> Result<(), GraphError> {
        if node.0 >= self.nodes.len() {
            return Err(GraphError::UnknownNode { node });
        }
        Ok(())
    }

    pub(crate) fn check_not_finalized(&self, operation: &str) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::Finalized {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_finalized(&self, operation: &str) -> Result<(), GraphError> {
        if !self.finalized {
            return Err(GraphError::NotFinalized {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_finalized(&mut self) {
        self.finalized = true;
    }

    pub(crate) fn pool(&self) -> &ParallelExecutor {
        self.pool.as_ref().expect("finalization builds the pool")
    }

    pub(crate) fn adjustable(&self, node: NodeId) -> Option<&dyn crate::ops::AdjustableOperator> {
        self.nodes[node.0]
            .operator
            .as_deref()
            .and_then(|op| op.as_adjustable())
    }

    pub(crate) fn value_slice(&self, node: NodeId) -> &[f32] {
        let slot = self.nodes[node.0].slot;
        self.groups[slot.group].value_of(slot.member)
    }

    pub(crate) fn value_slice_mut(&mut self, node: NodeId) -> &mut [f32] {
        let slot = self.nodes[node.0].slot;
        self.groups[slot.group].value_of_mut(slot.member)
    }

    pub(crate) fn delta_slice(&self, node: NodeId) -> &[f32] {
        if !self.nodes[node.0].needs_grad {
            return &[];
        }
        let slot = self.nodes[node.0].slot;
        self.groups[slot.group].delta_of(slot.member)
    }

    pub(crate) fn delta_slice_mut(&mut self, node: NodeId) -> &mut [f32] {
        if !self.nodes[node.0].needs_grad {
            return &mut [];
        }
        let slot = self.nodes[node.0].slot;
        self.groups[slot.group].delta_of_mut(slot.member)
    }

    /// The node's concatenated input values as seen by its operator.
    ///
    /// For gathered layouts this is the scratch filled during the last
    /// evaluation, which is exactly the view gradient formulas must see.
    pub(crate) fn input_view(&self, node: NodeId) -> &[f32] {
        match &self.nodes[node.0].layout {
            InputLayout::Empty => &[],
            InputLayout::Packed { group, span } => self.groups[*group].value_span(span.clone()),
            InputLayout::Gathered => &self.nodes[node.0].gather,
        }
    }

    pub(crate) fn has_delays(&self) -> bool {
        !self.lagged.is_empty()
    }

    pub(crate) fn output_len(&self) -> usize {
        self.output_nodes
            .iter()
            .map(|&output| self.nodes[output.0].len)
            .sum()
    }

    pub(crate) fn concat_outputs(&self) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.output_len());
        for &output in &self.output_nodes {
            values.extend_from_slice(self.value_slice(output));
        }
        values
    }

    /// Marks the seed nodes and everything downstream of them stale.
    pub(crate) fn cascade_stale(&mut self, seeds: &[NodeId]) {
        let mut visited: HashSet<NodeId> = seeds.iter().copied().collect();
        let mut stack: Vec<NodeId> = seeds.to_vec();
        while let Some(id) = stack.pop() {
            self.nodes[id.0].status.mark_stale();
            for &(consumer, _) in &self.nodes[id.0].consumers {
                if visited.insert(consumer) {
                    stack.push(consumer);
                }
            }
        }
    }

    /// Marks everything strictly downstream of the seeds stale, leaving the
    /// seeds themselves in their current state.
    pub(crate) fn cascade_stale_below(&mut self, seeds: &[NodeId]) {
        let mut visited: HashSet<NodeId> = seeds.iter().copied().collect();
        let mut stack: Vec<NodeId> = Vec::new();
        for &seed in seeds {
            for &(consumer, _) in &self.nodes[seed.0].consumers {
                if visited.insert(consumer) {
                    stack.push(consumer);
                }
            }
        }
        while let Some(id) = stack.pop() {
            self.nodes[id.0].status.mark_stale();
            for &(consumer, _) in &self.nodes[id.0].consumers {
                if visited.insert(consumer) {
                    stack.push(consumer);
                }
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
