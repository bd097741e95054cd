use crate::graph::delay::DelayBuffer;
use crate::graph::status::StatusTracker;
use crate::ops::Operator;
use std::fmt;
use std::ops::Range;

/// Stable handle to a node in a [`Graph`](crate::graph::Graph).
///
/// Handles are plain indices into the graph's node arena; they are `Copy` and
/// stay valid for the lifetime of the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The underlying arena index, stable for the graph's lifetime.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// Position of a node's buffers inside its group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub(crate) group: usize,
    pub(crate) member: usize,
}

/// How a node's concatenated input vector is assembled for its operator.
#[derive(Debug, Clone)]
pub(crate) enum InputLayout {
    /// The node has no inputs.
    Empty,
    /// All inputs sit adjacent in one group, in edge order; borrow in place.
    Packed { group: usize, span: Range<usize> },
    /// Inputs are copied into the node's gather buffer before each use.
    Gathered,
}

/// Runtime state of a lagged producer.
#[derive(Debug)]
pub(crate) struct DelayState {
    /// Value snapshots travelling forward in time.
    pub(crate) values: DelayBuffer,
    /// Gradient snapshots travelling backward in time.
    pub(crate) grads: DelayBuffer,
    /// The snapshot consumers read during the current step.
    pub(crate) staged: Vec<f32>,
}

impl DelayState {
    pub(crate) fn new(lag: usize, width: usize) -> Self {
        DelayState {
            values: DelayBuffer::filled(lag, width),
            grads: DelayBuffer::filled(lag, width),
            staged: vec![0.0; width],
        }
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    /// Buffer length; zero until finalization resolves operator outputs.
    pub(crate) len: usize,
    /// Producers feeding this node, in edge order.
    pub(crate) inputs: Vec<NodeId>,
    /// Consuming edges as (consumer, input slot of the consumer) pairs.
    pub(crate) consumers: Vec<(NodeId, usize)>,
    /// None for input nodes and for placeholders awaiting replacement.
    pub(crate) operator: Option<Box<dyn Operator>>,
    /// Number of steps this node's value is delayed on its outgoing edges.
    pub(crate) lag: usize,
    pub(crate) status: StatusTracker,
    pub(crate) needs_grad: bool,
    pub(crate) is_input: bool,
    pub(crate) is_output: bool,
    pub(crate) placeholder: bool,
    /// True while the operator holds uncommitted staged weight updates.
    pub(crate) staged_update: bool,
    pub(crate) slot: Slot,
    pub(crate) layout: InputLayout,
    /// Cumulative input lengths, one entry per edge plus the total.
    pub(crate) input_offsets: Vec<usize>,
    /// Scratch for assembling scattered or lagged inputs.
    pub(crate) gather: Vec<f32>,
    pub(crate) delay: Option<DelayState>,
}

impl Node {
    fn bare(len: usize) -> Self {
        Node {
            len,
            inputs: Vec::new(),
            consumers: Vec::new(),
            operator: None,
            lag: 0,
            status: StatusTracker::new(),
            needs_grad: false,
            is_input: false,
            is_output: false,
            placeholder: false,
            staged_update: false,
            slot: Slot {
                group: 0,
                member: 0,
            },
            layout: InputLayout::Empty,
            input_offsets: Vec::new(),
            gather: Vec::new(),
            delay: None,
        }
    }

    pub(crate) fn input(len: usize) -> Self {
        let mut node = Self::bare(len);
        node.is_input = true;
        node
    }

    pub(crate) fn placeholder(len: usize) -> Self {
        let mut node = Self::bare(len);
        node.placeholder = true;
        node
    }

    pub(crate) fn with_operator(operator: Box<dyn Operator>, inputs: Vec<NodeId>) -> Self {
        let mut node = Self::bare(0);
        node.operator = Some(operator);
        node.inputs = inputs;
        node
    }

    /// The total length of the node's concatenated input vector.
    pub(crate) fn input_len(&self) -> usize {
        self.input_offsets.last().copied().unwrap_or(0)
    }
}
