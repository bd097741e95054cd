//! Finalization: structural validation, buffer packing and operator setup.

use crate::cost::CostFunction;
use crate::error::GraphError;
use crate::exec::ParallelExecutor;
use crate::graph::group::NodeGroup;
use crate::graph::node::{DelayState, InputLayout, NodeId, Slot};
use crate::graph::Graph;
use log::info;
use std::collections::{HashMap, HashSet};

/// Outcome of the packing planner: group member lists, in final order.
struct GroupPlan {
    builders: Vec<Vec<NodeId>>,
}

impl Graph {
    /// Validates the topology, packs buffers and freezes the structure.
    ///
    /// The checks run in this order and stop at the first failure:
    ///
    /// 1. every placeholder has been replaced,
    /// 2. outputs are declared and free of duplicates,
    /// 3. every node affects at least one declared output,
    /// 4. zero-lag edges form no cycle (lagged edges are exempt),
    /// 5. every operator's output length matches the node's length.
    ///
    /// On success the node buffers are packed into groups, adjustable
    /// operators (re)initialize their weights, and the worker pool is built.
    /// On failure the graph is left unfrozen and structurally untouched, so
    /// the caller can repair the topology and finalize again.
    pub fn finalize(&mut self, cost_function: Box<dyn CostFunction>) -> Result<(), GraphError> {
        self.check_not_finalized("finalize")?;
        self.check_placeholders()?;
        self.check_outputs()?;
        self.check_reachability()?;
        self.check_zero_lag_cycles()?;
        let needs = self.propagate_gradient_need();
        let lens = self.resolve_lengths()?;

        let plan = self.plan_groups();
        let pool = ParallelExecutor::new(&self.executor_config)?;
        self.init_operators(&lens)?;
        self.apply_plan(lens, needs, plan, pool, cost_function);

        let gathered = self
            .nodes
            .iter()
            .filter(|n| matches!(n.layout, InputLayout::Gathered))
            .count();
        let parameters: usize = (0..self.nodes.len())
            .filter_map(|i| self.adjustable(NodeId(i)))
            .map(|a| a.param_len())
            .sum();
        info!(
            "finalized graph: {} nodes in {} groups ({} gathered), {} parameters, {} workers",
            self.nodes.len(),
            self.groups.len(),
            gathered,
            parameters,
            self.pool().workers()
        );
        Ok(())
    }

    fn check_placeholders(&self) -> Result<(), GraphError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.placeholder {
                return Err(GraphError::PlaceholderNotReplaced {
                    node: NodeId(index),
                });
            }
        }
        Ok(())
    }

    fn check_outputs(&self) -> Result<(), GraphError> {
        if self.outputs().is_empty() {
            return Err(GraphError::NoOutputs);
        }
        let mut seen = HashSet::new();
        for &output in self.outputs() {
            if !seen.insert(output) {
                return Err(GraphError::DuplicateOutput { node: output });
            }
        }
        Ok(())
    }

    /// Every node must transitively feed a declared output, through lagged
    /// edges or not. Orphans are wiring mistakes, not dead weight to skip.
    fn check_reachability(&self) -> Result<(), GraphError> {
        let mut reached = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self.outputs().to_vec();
        for &output in self.outputs() {
            reached[output.0] = true;
        }
        while let Some(id) = stack.pop() {
            for &input in &self.nodes[id.0].inputs {
                if !reached[input.0] {
                    reached[input.0] = true;
                    stack.push(input);
                }
            }
        }
        if let Some(index) = reached.iter().position(|&r| !r) {
            return Err(GraphError::UnreachableNode {
                node: NodeId(index),
            });
        }
        Ok(())
    }

    /// Depth-first search over same-step edges only. A lagged node's
    /// outgoing edges cross a time step, so the walk never leaves through
    /// them; that is precisely why recurrent wiring needs a positive lag.
    fn check_zero_lag_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color = vec![Color::White; self.nodes.len()];
        let mut path: Vec<NodeId> = Vec::new();

        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;
            path.push(NodeId(start));
            while let Some(&(index, edge)) = stack.last() {
                let crosses_step = self.nodes[index].lag > 0;
                let next = if crosses_step {
                    None
                } else {
                    self.nodes[index].consumers.get(edge).copied()
                };
                match next {
                    None => {
                        color[index] = Color::Black;
                        path.pop();
                        stack.pop();
                    }
                    Some((consumer, _)) => {
                        stack.last_mut().expect("stack is nonempty").1 += 1;
                        match color[consumer.0] {
                            Color::White => {
                                color[consumer.0] = Color::Gray;
                                path.push(consumer);
                                stack.push((consumer.0, 0));
                            }
                            Color::Gray => {
                                let pos = path
                                    .iter()
                                    .position(|&p| p == consumer)
                                    .expect("gray nodes are on the current path");
                                return Err(GraphError::ZeroLagCycle {
                                    nodes: path[pos..].to_vec(),
                                });
                            }
                            Color::Black => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// A node carries gradients when it holds parameters or when anything
    /// upstream of it does. Lagged edges propagate the need like any other.
    fn propagate_gradient_need(&self) -> Vec<bool> {
        let mut needs = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let adjustable = node
                .operator
                .as_deref()
                .map_or(false, |op| op.as_adjustable().is_some());
            if adjustable {
                needs[index] = true;
                stack.push(index);
            }
        }
        while let Some(index) = stack.pop() {
            for &(consumer, _) in &self.nodes[index].consumers {
                if !needs[consumer.0] {
                    needs[consumer.0] = true;
                    stack.push(consumer.0);
                }
            }
        }
        needs
    }

    /// Computes every node's buffer length and checks operator agreement.
    ///
    /// Input nodes and placeholders declare their length up front; fresh
    /// operator nodes derive theirs. A node created through `add_node` can
    /// only reference earlier nodes, so a single pass in id order resolves
    /// all derived lengths before the declared ones are cross-checked.
    fn resolve_lengths(&self) -> Result<Vec<usize>, GraphError> {
        let mut lens: Vec<usize> = self.nodes.iter().map(|n| n.len).collect();
        for (index, node) in self.nodes.iter().enumerate() {
            if lens[index] != 0 {
                continue;
            }
            let op = node
                .operator
                .as_deref()
                .expect("nodes without operators declare their length");
            let input_lens: Vec<usize> = node.inputs.iter().map(|&i| lens[i.0]).collect();
            lens[index] = op
                .output_len(&input_lens)
                .map_err(|e| e.at_node(NodeId(index), "finalize"))?;
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if lens[index] == 0 {
                return Err(GraphError::ZeroLength.at_node(NodeId(index), "finalize"));
            }
            let Some(op) = node.operator.as_deref() else {
                continue;
            };
            let input_lens: Vec<usize> = node.inputs.iter().map(|&i| lens[i.0]).collect();
            let produced = op
                .output_len(&input_lens)
                .map_err(|e| e.at_node(NodeId(index), "finalize"))?;
            if produced != lens[index] {
                return Err(GraphError::DimensionMismatch {
                    node: NodeId(index),
                    expected: lens[index],
                    actual: produced,
                    operation: "finalize".to_string(),
                });
            }
        }
        Ok(lens)
    }

    /// Greedy packing. Walks consumers in id order; the first consumer whose
    /// input set is entirely unclaimed founds a group holding those inputs in
    /// edge order. Later consumers may extend a group at either end when
    /// their claimed inputs already sit contiguously at that end. Everything
    /// else, including every consumer of a lagged producer, falls back to
    /// gathering and every unclaimed node gets a group of its own.
    fn plan_groups(&self) -> GroupPlan {
        let mut claim: HashMap<NodeId, usize> = HashMap::new();
        let mut builders: Vec<Vec<NodeId>> = Vec::new();

        for node in &self.nodes {
            let inputs = &node.inputs;
            if inputs.is_empty() || !self.packable_inputs(inputs) {
                continue;
            }
            let claimed: Vec<Option<usize>> = inputs
                .iter()
                .map(|input| claim.get(input).copied())
                .collect();

            if claimed.iter().all(Option::is_none) {
                let group = builders.len();
                builders.push(inputs.clone());
                for &input in inputs {
                    claim.insert(input, group);
                }
                continue;
            }

            if let Some((group, prefix, suffix)) =
                self.extension_plan(inputs, &claimed, &builders)
            {
                for &input in prefix.iter().rev() {
                    builders[group].insert(0, input);
                    claim.insert(input, group);
                }
                for &input in suffix {
                    builders[group].push(input);
                    claim.insert(input, group);
                }
            }
        }

        for index in 0..self.nodes.len() {
            let id = NodeId(index);
            if !claim.contains_key(&id) {
                let group = builders.len();
                builders.push(vec![id]);
                claim.insert(id, group);
            }
        }

        GroupPlan { builders }
    }

    /// Inputs qualify for in-place packing only when none is lagged (those
    /// are read from staged snapshots) and no producer appears twice.
    fn packable_inputs(&self, inputs: &[NodeId]) -> bool {
        if inputs
            .iter()
            .any(|&input| self.nodes[input.0].lag > 0)
        {
            return false;
        }
        !inputs
            .iter()
            .enumerate()
            .any(|(k, input)| inputs[..k].contains(input))
    }

    /// Decides whether `inputs` can extend one existing group.
    ///
    /// Requires the already-claimed inputs to form one contiguous block of
    /// the edge list, matching a run of the group's members, with room to
    /// prepend the leading unclaimed inputs and append the trailing ones.
    /// Returns the group plus the prefix and suffix slices to add.
    fn extension_plan<'a>(
        &self,
        inputs: &'a [NodeId],
        claimed: &[Option<usize>],
        builders: &[Vec<NodeId>],
    ) -> Option<(usize, &'a [NodeId], &'a [NodeId])> {
        let first = claimed.iter().position(Option::is_some)?;
        let last = claimed.iter().rposition(Option::is_some)?;
        if claimed[first..=last].iter().any(Option::is_none) {
            return None;
        }
        let group = claimed[first]?;
        if claimed[first..=last].iter().any(|&c| c != Some(group)) {
            return None;
        }

        let run = &inputs[first..=last];
        let members = &builders[group];
        let at = members
            .windows(run.len())
            .position(|window| window == run)?;
        if first > 0 && at != 0 {
            return None;
        }
        if last + 1 < inputs.len() && at + run.len() != members.len() {
            return None;
        }
        Some((group, &inputs[..first], &inputs[last + 1..]))
    }

    fn init_operators(&mut self, lens: &[usize]) -> Result<(), GraphError> {
        for index in 0..self.nodes.len() {
            let input_lens: Vec<usize> = self.nodes[index]
                .inputs
                .iter()
                .map(|&i| lens[i.0])
                .collect();
            let output_len = lens[index];
            let Some(op) = self.nodes[index].operator.as_deref_mut() else {
                continue;
            };
            op.init(&input_lens, output_len)
                .map_err(|e| e.at_node(NodeId(index), "finalize"))?;
        }
        Ok(())
    }

    /// Commits the plan. Everything here is infallible by construction.
    fn apply_plan(
        &mut self,
        lens: Vec<usize>,
        needs: Vec<bool>,
        plan: GroupPlan,
        pool: ParallelExecutor,
        cost_function: Box<dyn CostFunction>,
    ) {
        for (index, len) in lens.iter().enumerate() {
            self.nodes[index].len = *len;
            self.nodes[index].needs_grad = needs[index];
            let offsets: Vec<usize> = std::iter::once(0)
                .chain(self.nodes[index].inputs.iter().scan(0, |acc, &i| {
                    *acc += lens[i.0];
                    Some(*acc)
                }))
                .collect();
            self.nodes[index].input_offsets = offsets;
        }

        self.groups = plan
            .builders
            .iter()
            .map(|members| {
                let member_lens: Vec<usize> = members.iter().map(|&m| lens[m.0]).collect();
                let with_deltas = members.iter().any(|&m| needs[m.0]);
                NodeGroup::build(members.clone(), &member_lens, with_deltas)
            })
            .collect();
        for (group, members) in plan.builders.iter().enumerate() {
            for (member, &id) in members.iter().enumerate() {
                self.nodes[id.0].slot = Slot { group, member };
            }
        }

        for index in 0..self.nodes.len() {
            self.nodes[index].layout = self.in_place_layout(NodeId(index));
            if matches!(self.nodes[index].layout, InputLayout::Gathered) {
                let total = self.nodes[index].input_len();
                self.nodes[index].gather = vec![0.0; total];
            }
        }

        self.lagged = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].lag > 0)
            .map(NodeId)
            .collect();
        let lagged = self.lagged.clone();
        for id in lagged {
            let node = &mut self.nodes[id.0];
            node.delay = Some(DelayState::new(node.lag, node.len));
        }

        let outputs = self.outputs().to_vec();
        for output in outputs {
            self.nodes[output.0].is_output = true;
        }

        self.cost_function = Some(cost_function);
        self.pool = Some(pool);
        self.set_finalized();
    }

    /// Derives a node's input layout from the final group memberships.
    fn in_place_layout(&self, id: NodeId) -> InputLayout {
        let inputs = &self.nodes[id.0].inputs;
        if inputs.is_empty() {
            return InputLayout::Empty;
        }
        if !self.packable_inputs(inputs) {
            return InputLayout::Gathered;
        }
        let slot = self.nodes[inputs[0].0].slot;
        let group = &self.groups[slot.group];
        let start = slot.member;
        if start + inputs.len() > group.member_count() {
            return InputLayout::Gathered;
        }
        for (k, &input) in inputs.iter().enumerate() {
            if group.members()[start + k] != input {
                return InputLayout::Gathered;
            }
        }
        let span =
            group.member_range(start).start..group.member_range(start + inputs.len() - 1).end;
        InputLayout::Packed {
            group: slot.group,
            span,
        }
    }
}
