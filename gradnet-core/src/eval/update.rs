//! The weight adjustment and commit passes.

use crate::error::GraphError;
use crate::graph::{Graph, NodeId, PassState};
use crate::ops::GradContext;
use crate::optim::Optimizer;
use log::debug;

impl Graph {
    /// Runs the optimizer over every adjustable node's parameter gradients.
    ///
    /// With `defer` set, updates land in each operator's staged buffer and
    /// the live parameters (and therefore every computed value) stay put
    /// until [`commit_weights`](Graph::commit_weights); repeated deferred
    /// adjustments add up, which is how a mini batch accumulates. Without
    /// `defer` the live parameters move immediately and everything
    /// downstream of an updated node is marked for recomputation.
    ///
    /// # Panics
    ///
    /// Panics if gradients were not accumulated for the current evaluation.
    pub fn adjust_weights(
        &mut self,
        optimizer: &mut dyn Optimizer,
        learning_rate: f32,
        defer: bool,
    ) -> Result<(), GraphError> {
        self.check_finalized("adjust_weights")?;
        let mut updated = Vec::new();
        for index in 0..self.nodes.len() {
            let id = NodeId(index);
            if self.adjustable(id).is_none() {
                continue;
            }
            let gradients = self.node_param_gradients(id)?;
            let node = &mut self.nodes[index];
            let adjustable = node
                .operator
                .as_deref_mut()
                .and_then(|op| op.as_adjustable_mut())
                .expect("checked adjustable above");
            let target = if defer {
                adjustable.staged_mut()
            } else {
                adjustable.params_mut()
            };
            optimizer
                .run(id, &gradients, target, learning_rate)
                .map_err(|e| e.at_node(id, "adjust_weights"))?;
            if defer {
                node.staged_update = true;
            }
            node.status.mark_adjusted();
            if !defer {
                node.status.mark_committed();
            }
            updated.push(id);
        }
        // Invalidation waits until every node took its update, so a node
        // downstream of another adjustable one is not knocked out of the
        // GradientsReady state it still needs this pass.
        if !defer {
            self.cascade_stale_below(&updated);
        }
        debug!(
            "adjusted {} nodes (learning rate {}, deferred: {})",
            updated.len(),
            learning_rate,
            defer
        );
        Ok(())
    }

    /// Applies every staged weight update to the live parameters.
    ///
    /// Nodes without a pending staged update are left alone, so committing
    /// after a non-deferred adjustment is a harmless no-op. Committed nodes
    /// and everything downstream of them are recomputed by the next
    /// evaluation.
    pub fn commit_weights(&mut self) -> Result<(), GraphError> {
        self.check_finalized("commit_weights")?;
        let mut committed = Vec::new();
        for index in 0..self.nodes.len() {
            if !self.nodes[index].staged_update {
                continue;
            }
            let node = &mut self.nodes[index];
            let adjustable = node
                .operator
                .as_deref_mut()
                .and_then(|op| op.as_adjustable_mut())
                .expect("staged updates live on adjustable operators");
            adjustable.commit_staged();
            node.staged_update = false;
            node.status.mark_committed();
            committed.push(NodeId(index));
        }
        if !committed.is_empty() {
            self.cascade_stale_below(&committed);
            debug!("committed staged updates on {} nodes", committed.len());
        }
        Ok(())
    }

    /// The flattened `d(cost)/d(parameter)` vector of one adjustable node.
    ///
    /// Valid between gradient accumulation and the next pass that disturbs
    /// the deltas.
    ///
    /// # Panics
    ///
    /// Panics if the node's gradients were not accumulated.
    pub fn parameter_gradients(&self, node: NodeId) -> Result<Vec<f32>, GraphError> {
        self.check_finalized("parameter_gradients")?;
        self.check_known(node)?;
        self.node_param_gradients(node)
    }

    fn node_param_gradients(&self, id: NodeId) -> Result<Vec<f32>, GraphError> {
        let adjustable = self
            .adjustable(id)
            .ok_or(GraphError::NotAdjustable { node: id })?;
        assert!(
            self.nodes[id.0].status.state() == PassState::GradientsReady,
            "parameter gradients require accumulated gradients ({} is {:?})",
            id,
            self.nodes[id.0].status.state()
        );
        let node = &self.nodes[id.0];
        let ctx = GradContext {
            delta: self.delta_slice(id),
            inputs: self.input_view(id),
            values: self.value_slice(id),
            input_offsets: &node.input_offsets,
        };
        let mut gradients = vec![0.0; adjustable.param_len()];
        adjustable
            .param_gradients(&ctx, &mut gradients, self.pool())
            .map_err(|e| e.at_node(id, "parameter_gradients"))?;
        Ok(gradients)
    }
}
