//! The evaluation pass.

use crate::error::GraphError;
use crate::graph::group;
use crate::graph::node::{DelayState, InputLayout, NodeId};
use crate::graph::Graph;
use log::{debug, trace};
use std::mem;

impl Graph {
    /// Brings every declared output up to date.
    ///
    /// Nodes are recomputed only when something upstream of them changed
    /// since their last evaluation; an unchanged graph makes this a no-op.
    /// On graphs with lagged edges a non-trivial pass is one time step: the
    /// delay lines advance by one snapshot before anything is computed and
    /// receive the fresh values afterwards. A no-op pass leaves time alone.
    pub fn evaluate(&mut self) -> Result<(), GraphError> {
        self.check_finalized("evaluate")?;
        if self.nodes.iter().all(|n| !n.status.requires_evaluation()) {
            trace!("evaluate: everything is current");
            return Ok(());
        }
        let advancing = self.has_delays() && !self.computing_gradients;
        if advancing {
            self.begin_step()?;
        }
        let outputs = self.outputs().to_vec();
        for output in outputs {
            self.eval_node(output)?;
        }
        if advancing {
            self.finish_step()?;
        }
        Ok(())
    }

    /// Recursively evaluates `id` and its same-step upstream cone.
    ///
    /// Lagged producers are not recursed into; their consumers read the
    /// staged snapshot popped at the start of the step, so a recurrent loop
    /// never sends this recursion in a circle.
    pub(crate) fn eval_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.nodes[id.0].status.requires_evaluation() {
            return Ok(());
        }
        if self.nodes[id.0].is_input {
            // Input buffers hold externally supplied values as-is.
            self.nodes[id.0].status.mark_evaluated();
            return Ok(());
        }
        let inputs = self.nodes[id.0].inputs.clone();
        for &input in &inputs {
            if self.nodes[input.0].lag == 0 {
                self.eval_node(input)?;
            }
        }
        self.fill_gather(id);
        self.compute(id)?;
        self.nodes[id.0].status.mark_evaluated();
        trace!(
            "evaluated {} (generation {})",
            id,
            self.nodes[id.0].status.generation()
        );
        Ok(())
    }

    /// Copies scattered input values into the node's gather scratch.
    ///
    /// Lagged producers contribute their staged snapshot instead of their
    /// live buffer; that snapshot is `lag` steps old by construction.
    fn fill_gather(&mut self, id: NodeId) {
        if !matches!(self.nodes[id.0].layout, InputLayout::Gathered) {
            return;
        }
        let mut gather = mem::take(&mut self.nodes[id.0].gather);
        let node = &self.nodes[id.0];
        for (edge, &input) in node.inputs.iter().enumerate() {
            let span = node.input_offsets[edge]..node.input_offsets[edge + 1];
            let producer = &self.nodes[input.0];
            let source: &[f32] = if producer.lag > 0 {
                &producer
                    .delay
                    .as_ref()
                    .expect("lagged nodes carry delay state")
                    .staged
            } else {
                self.value_slice(input)
            };
            gather[span].copy_from_slice(source);
        }
        self.nodes[id.0].gather = gather;
    }

    /// Runs the node's operator over its input view.
    fn compute(&mut self, id: NodeId) -> Result<(), GraphError> {
        let Graph {
            nodes,
            groups,
            pool,
            ..
        } = self;
        let node = &nodes[id.0];
        let op = node
            .operator
            .as_deref()
            .expect("non-input nodes carry operators");
        let pool = pool.as_ref().expect("finalization builds the pool");
        let out_range = groups[node.slot.group].member_range(node.slot.member);
        let result = match &node.layout {
            InputLayout::Empty => {
                let out = groups[node.slot.group].value_of_mut(node.slot.member);
                op.evaluate(&[], out, pool)
            }
            InputLayout::Packed { group, span } => {
                let (input, out) =
                    group::in_out(groups, *group, span.clone(), node.slot.group, out_range);
                op.evaluate(input, out, pool)
            }
            InputLayout::Gathered => {
                let out = groups[node.slot.group].value_of_mut(node.slot.member);
                op.evaluate(&node.gather, out, pool)
            }
        };
        result.map_err(|e| e.at_node(id, "evaluate"))
    }

    /// Advances every delay line by one snapshot and invalidates the nodes
    /// that read them.
    fn begin_step(&mut self) -> Result<(), GraphError> {
        let lagged = self.lagged.clone();
        for &id in &lagged {
            let node = &mut self.nodes[id.0];
            let delay = node.delay.as_mut().expect("lagged nodes carry delay state");
            let DelayState { values, staged, .. } = delay;
            values.pop_into(staged)?;
        }
        let readers: Vec<NodeId> = lagged
            .iter()
            .flat_map(|&id| self.nodes[id.0].consumers.iter().map(|&(c, _)| c))
            .collect();
        self.cascade_stale(&readers);
        Ok(())
    }

    /// Evaluates the nodes only reachable through lagged edges and records
    /// this step's value snapshots.
    fn finish_step(&mut self) -> Result<(), GraphError> {
        let lagged = self.lagged.clone();
        for &id in &lagged {
            self.eval_node(id)?;
        }
        let Graph { nodes, groups, .. } = self;
        for &id in &lagged {
            let node = &mut nodes[id.0];
            let value = groups[node.slot.group].value_of(node.slot.member);
            let delay = node.delay.as_mut().expect("lagged nodes carry delay state");
            delay.values.push(value)?;
        }
        self.steps += 1;
        debug!("completed step {}", self.steps);
        Ok(())
    }
}
