//! Sources of training samples.

use gradnet_core::GraphError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One training sample, borrowed from its supplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<'a> {
    /// Values for the graph's input nodes, concatenated in input order.
    pub inputs: &'a [f32],
    /// Values for the declared outputs, concatenated in output order.
    pub targets: &'a [f32],
}

/// Serves training samples by iteration index.
///
/// The index is the trainer's global iteration counter, not a position in
/// the underlying data; implementations decide how iterations map onto
/// samples. [`batch_ended`](DataSupplier::batch_ended) marks the iterations
/// after which staged weight updates should be folded in.
pub trait DataSupplier {
    /// The sample to train on at `iteration`.
    fn get(&self, iteration: usize) -> Result<Sample<'_>, GraphError>;

    /// Whether `iteration` is the last one of its mini-batch.
    fn batch_ended(&self, iteration: usize) -> bool;
}

/// An in-memory sample list cycled endlessly by iteration index.
#[derive(Debug, Clone)]
pub struct VecSupplier {
    samples: Vec<(Vec<f32>, Vec<f32>)>,
    batch_len: usize,
}

impl VecSupplier {
    /// A supplier whose every iteration is its own batch.
    pub fn new(samples: Vec<(Vec<f32>, Vec<f32>)>) -> Result<Self, GraphError> {
        Self::with_batch_len(samples, 1)
    }

    /// A supplier that groups consecutive iterations into batches of
    /// `batch_len`.
    ///
    /// # Panics
    ///
    /// Panics if `batch_len` is zero.
    pub fn with_batch_len(
        samples: Vec<(Vec<f32>, Vec<f32>)>,
        batch_len: usize,
    ) -> Result<Self, GraphError> {
        assert!(batch_len > 0, "batch length must be at least one");
        if samples.is_empty() {
            return Err(GraphError::EmptySupplier);
        }
        Ok(VecSupplier { samples, batch_len })
    }

    /// Like [`with_batch_len`](VecSupplier::with_batch_len), but visits the
    /// samples in a reproducibly shuffled order.
    ///
    /// # Panics
    ///
    /// Panics if `batch_len` is zero.
    pub fn shuffled(
        mut samples: Vec<(Vec<f32>, Vec<f32>)>,
        batch_len: usize,
        seed: u64,
    ) -> Result<Self, GraphError> {
        let mut rng = StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);
        Self::with_batch_len(samples, batch_len)
    }

    /// The number of distinct samples, which is also the cycle length.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl DataSupplier for VecSupplier {
    fn get(&self, iteration: usize) -> Result<Sample<'_>, GraphError> {
        let (inputs, targets) = &self.samples[iteration % self.samples.len()];
        Ok(Sample { inputs, targets })
    }

    fn batch_ended(&self, iteration: usize) -> bool {
        (iteration + 1) % self.batch_len == 0
    }
}
