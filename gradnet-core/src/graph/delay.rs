use crate::error::GraphError;

/// Bounded FIFO of fixed-width snapshots backing a lagged edge.
///
/// A node with lag `n` owns two of these with capacity `n`: one carrying value
/// snapshots forward in time, one carrying gradient snapshots backward. The
/// buffer is a flat ring so a snapshot never allocates.
#[derive(Debug, Clone)]
pub(crate) struct DelayBuffer {
    data: Vec<f32>,
    width: usize,
    capacity: usize,
    /// Slot index of the oldest snapshot.
    head: usize,
    occupied: usize,
}

impl DelayBuffer {
    /// An empty buffer with room for `capacity` snapshots of `width` values.
    pub(crate) fn new(capacity: usize, width: usize) -> Self {
        assert!(capacity > 0, "delay buffers need room for one snapshot");
        assert!(width > 0, "delay buffers carry nonzero-width snapshots");
        DelayBuffer {
            data: vec![0.0; capacity * width],
            width,
            capacity,
            head: 0,
            occupied: 0,
        }
    }

    /// A buffer pre-filled to capacity with zero snapshots.
    ///
    /// Lagged nodes start from this state so the first `capacity` steps read
    /// a zero history instead of underflowing.
    pub(crate) fn filled(capacity: usize, width: usize) -> Self {
        let mut buffer = Self::new(capacity, width);
        buffer.occupied = capacity;
        buffer
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn occupied(&self) -> usize {
        self.occupied
    }

    pub(crate) fn is_full(&self) -> bool {
        self.occupied == self.capacity
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Appends a snapshot behind the newest one.
    ///
    /// Rejects the snapshot when the buffer is full. The pass protocol pops
    /// before it pushes, so an overflow means the caller drove the passes out
    /// of order rather than a capacity problem.
    pub(crate) fn push(&mut self, snapshot: &[f32]) -> Result<(), GraphError> {
        debug_assert_eq!(snapshot.len(), self.width, "snapshot width mismatch");
        if self.is_full() {
            return Err(GraphError::DelayOverflow {
                capacity: self.capacity,
            });
        }
        let slot = (self.head + self.occupied) % self.capacity;
        let start = slot * self.width;
        self.data[start..start + self.width].copy_from_slice(snapshot);
        self.occupied += 1;
        Ok(())
    }

    /// Removes the oldest snapshot into `out`.
    pub(crate) fn pop_into(&mut self, out: &mut [f32]) -> Result<(), GraphError> {
        debug_assert_eq!(out.len(), self.width, "snapshot width mismatch");
        if self.is_empty() {
            return Err(GraphError::DelayUnderflow);
        }
        let start = self.head * self.width;
        out.copy_from_slice(&self.data[start..start + self.width]);
        self.head = (self.head + 1) % self.capacity;
        self.occupied -= 1;
        Ok(())
    }
}
