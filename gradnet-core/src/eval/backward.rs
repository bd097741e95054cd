//! The gradient accumulation pass.

use crate::error::GraphError;
use crate::graph::{Graph, NodeId, PassState};
use crate::ops::GradContext;
use log::debug;

impl Graph {
    /// Accumulates `d(cost)/d(value)` into the delta buffer of every node
    /// that participates in gradient propagation.
    ///
    /// The graph must have been evaluated for its current inputs. Output
    /// deltas are seeded from the cost function's derivatives against
    /// `targets`, then each node's delta is assembled from its consumers'
    /// finished deltas, walking zero-lag edges only.
    ///
    /// On graphs with lagged edges this is one step of truncated
    /// backpropagation through time: a lagged node's delta is the aged
    /// gradient popped from its delay line, and the gradient its current
    /// snapshot will deserve is pushed back to surface `lag` passes later.
    ///
    /// # Panics
    ///
    /// Panics if a participating node was not evaluated for the current
    /// inputs, i.e. the evaluation pass was skipped or bypassed.
    pub fn accumulate_gradients(&mut self, targets: &[f32]) -> Result<(), GraphError> {
        self.check_finalized("accumulate_gradients")?;
        let expected = self.output_len();
        if targets.len() != expected {
            return Err(GraphError::TargetLength {
                expected,
                actual: targets.len(),
            });
        }
        self.computing_gradients = true;
        let result = self.accumulate_inner(targets);
        self.computing_gradients = false;
        result
    }

    fn accumulate_inner(&mut self, targets: &[f32]) -> Result<(), GraphError> {
        for group in &mut self.groups {
            group.clear_deltas();
        }
        for node in &mut self.nodes {
            if node.needs_grad {
                node.status.reset_gradients();
            }
        }

        self.seed_output_deltas(targets);

        for index in 0..self.nodes.len() {
            if self.nodes[index].needs_grad {
                self.ensure_gradients(NodeId(index))?;
            }
        }

        self.push_lagged_gradients()?;

        let flowed = self.nodes.iter().filter(|n| n.needs_grad).count();
        debug!("accumulated gradients across {} nodes", flowed);
        Ok(())
    }

    /// Seeds the deltas of the output nodes with the cost derivatives.
    ///
    /// The derivatives are taken over the concatenated output vector in one
    /// call, so cost functions that normalize by length see the same total
    /// the scalar cost saw.
    fn seed_output_deltas(&mut self, targets: &[f32]) {
        let outputs = self.concat_outputs();
        let mut seed = vec![0.0; outputs.len()];
        let cost_function = self
            .cost_function
            .as_deref()
            .expect("finalized graphs hold a cost function");
        cost_function.derivatives(&outputs, targets, &mut seed, self.pool());

        let output_nodes = self.outputs().to_vec();
        let mut offset = 0;
        for output in output_nodes {
            let len = self.nodes[output.0].len;
            let piece = &seed[offset..offset + len];
            let delta = self.delta_slice_mut(output);
            for (d, s) in delta.iter_mut().zip(piece) {
                *d += *s;
            }
            offset += len;
        }
    }

    /// Finishes the delta of `id`, recursing into consumers first.
    ///
    /// A consumer of a node that participates in gradient propagation
    /// participates itself, so every consumer visited here has a delta
    /// buffer. The recursion follows zero-lag edges only and therefore
    /// terminates on the validated acyclic part of the graph.
    fn ensure_gradients(&mut self, id: NodeId) -> Result<(), GraphError> {
        if self.nodes[id.0].status.state() == PassState::GradientsReady {
            return Ok(());
        }
        if self.nodes[id.0].lag > 0 {
            // The value computed this step reaches the cost only in future
            // steps; what this node earns now is the gradient its snapshot
            // from `lag` steps ago was owed, aged through the delay line.
            let mut aged = vec![0.0; self.nodes[id.0].len];
            let delay = self.nodes[id.0]
                .delay
                .as_mut()
                .expect("lagged nodes carry delay state");
            delay.grads.pop_into(&mut aged)?;
            let delta = self.delta_slice_mut(id);
            for (d, a) in delta.iter_mut().zip(&aged) {
                *d += *a;
            }
        } else {
            let consumers = self.nodes[id.0].consumers.clone();
            let mut scratch = vec![0.0; self.nodes[id.0].len];
            for (consumer, edge) in consumers {
                self.ensure_gradients(consumer)?;
                self.consumer_contribution(consumer, edge, &mut scratch)?;
                let delta = self.delta_slice_mut(id);
                for (d, s) in delta.iter_mut().zip(&scratch) {
                    *d += *s;
                }
            }
        }
        self.nodes[id.0].status.mark_gradients_ready();
        Ok(())
    }

    /// What the consumer's gradient formula sends back over one edge.
    ///
    /// The contribution lands in `out` as a full overwrite; the caller adds
    /// it onto the producer's delta.
    fn consumer_contribution(
        &self,
        consumer: NodeId,
        edge: usize,
        out: &mut [f32],
    ) -> Result<(), GraphError> {
        let node = &self.nodes[consumer.0];
        let op = node
            .operator
            .as_deref()
            .expect("consumers carry operators");
        let ctx = GradContext {
            delta: self.delta_slice(consumer),
            inputs: self.input_view(consumer),
            values: self.value_slice(consumer),
            input_offsets: &node.input_offsets,
        };
        op.input_gradient(&ctx, edge, out, self.pool())
            .map_err(|e| e.at_node(consumer, "accumulate_gradients"))
    }

    /// Sends each lagged node the gradient its staged snapshot earned this
    /// step, to be popped `lag` passes from now.
    fn push_lagged_gradients(&mut self) -> Result<(), GraphError> {
        let lagged = self.lagged.clone();
        for &id in &lagged {
            if !self.nodes[id.0].needs_grad {
                continue;
            }
            let len = self.nodes[id.0].len;
            let mut outgoing = vec![0.0; len];
            let mut scratch = vec![0.0; len];
            let consumers = self.nodes[id.0].consumers.clone();
            for (consumer, edge) in consumers {
                self.consumer_contribution(consumer, edge, &mut scratch)?;
                for (o, s) in outgoing.iter_mut().zip(&scratch) {
                    *o += *s;
                }
            }
            let delay = self.nodes[id.0]
                .delay
                .as_mut()
                .expect("lagged nodes carry delay state");
            delay.grads.push(&outgoing)?;
        }
        Ok(())
    }
}
