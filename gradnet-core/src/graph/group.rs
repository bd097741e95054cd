use crate::graph::node::NodeId;
use std::ops::Range;

/// Contiguous storage for the value and delta buffers of a set of nodes.
///
/// Finalization packs nodes into groups so that the common case, a node whose
/// inputs all sit next to each other, can hand its operator one borrowed
/// slice instead of gathering copies. The delta backing mirrors the value
/// backing element for element and is only allocated when some member
/// participates in gradient propagation.
#[derive(Debug)]
pub(crate) struct NodeGroup {
    members: Vec<NodeId>,
    /// Cumulative element offsets, one entry per member plus the total.
    offsets: Vec<usize>,
    values: Vec<f32>,
    deltas: Vec<f32>,
}

impl NodeGroup {
    pub(crate) fn build(members: Vec<NodeId>, lens: &[usize], with_deltas: bool) -> Self {
        debug_assert_eq!(members.len(), lens.len());
        let mut offsets = Vec::with_capacity(lens.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for &len in lens {
            total += len;
            offsets.push(total);
        }
        NodeGroup {
            members,
            offsets,
            values: vec![0.0; total],
            deltas: if with_deltas { vec![0.0; total] } else { Vec::new() },
        }
    }

    pub(crate) fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub(crate) fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Element range of one member inside the group backing.
    pub(crate) fn member_range(&self, member: usize) -> Range<usize> {
        self.offsets[member]..self.offsets[member + 1]
    }

    pub(crate) fn value_of(&self, member: usize) -> &[f32] {
        &self.values[self.member_range(member)]
    }

    pub(crate) fn value_of_mut(&mut self, member: usize) -> &mut [f32] {
        let range = self.member_range(member);
        &mut self.values[range]
    }

    /// Borrows an arbitrary element span, used by packed input layouts.
    pub(crate) fn value_span(&self, span: Range<usize>) -> &[f32] {
        &self.values[span]
    }

    pub(crate) fn has_deltas(&self) -> bool {
        !self.deltas.is_empty()
    }

    /// Delta slice of one member, empty when the group carries no deltas.
    pub(crate) fn delta_of(&self, member: usize) -> &[f32] {
        if self.deltas.is_empty() {
            return &[];
        }
        &self.deltas[self.member_range(member)]
    }

    pub(crate) fn delta_of_mut(&mut self, member: usize) -> &mut [f32] {
        if self.deltas.is_empty() {
            return &mut [];
        }
        let range = self.member_range(member);
        &mut self.deltas[range]
    }

    /// Zeroes the whole delta backing in one pass.
    pub(crate) fn clear_deltas(&mut self) {
        self.deltas.fill(0.0);
    }
}

/// Borrows an input span immutably and an output range mutably at once.
///
/// The two may live in the same group (a node packed next to its own inputs)
/// or in different groups; either way the ranges are disjoint because a node
/// never appears in its own zero-lag input set.
pub(crate) fn in_out<'a>(
    groups: &'a mut [NodeGroup],
    in_group: usize,
    in_span: Range<usize>,
    out_group: usize,
    out_range: Range<usize>,
) -> (&'a [f32], &'a mut [f32]) {
    if in_group == out_group {
        let values = &mut groups[in_group].values;
        if in_span.end <= out_range.start {
            let (left, right) = values.split_at_mut(out_range.start);
            (&left[in_span], &mut right[..out_range.len()])
        } else {
            assert!(
                out_range.end <= in_span.start,
                "input span and output range overlap"
            );
            let (left, right) = values.split_at_mut(in_span.start);
            (&right[..in_span.len()], &mut left[out_range])
        }
    } else if in_group < out_group {
        let (left, right) = groups.split_at_mut(out_group);
        (
            &left[in_group].values[in_span],
            &mut right[0].values[out_range],
        )
    } else {
        let (left, right) = groups.split_at_mut(in_group);
        (
            &right[0].values[in_span],
            &mut left[out_group].values[out_range],
        )
    }
}
