//! Sample supply and training loop plumbing for GradNet graphs.
//!
//! [`DataSupplier`] hands out training samples by iteration index and marks
//! mini-batch boundaries; [`Trainer`] drives a finalized
//! [`Graph`](gradnet_core::Graph) through the evaluate, accumulate and adjust
//! passes, one sample per iteration.

pub mod supplier;
pub mod trainer;

#[cfg(test)]
mod supplier_test;

pub use supplier::{DataSupplier, Sample, VecSupplier};
pub use trainer::{TrainReport, Trainer, TrainerConfig};
