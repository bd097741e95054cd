//! Cost functions over the concatenated output vector.

use crate::exec::ParallelExecutor;
use std::fmt;

/// Distance between the declared outputs and a target vector.
///
/// Both slices always have the same length; the engine validates that
/// before calling in.
pub trait CostFunction: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Scalar cost of `outputs` against `targets`.
    fn cost(&self, outputs: &[f32], targets: &[f32], pool: &ParallelExecutor) -> f32;

    /// Writes `d(cost)/d(output)` for every output element into `out`.
    fn derivatives(
        &self,
        outputs: &[f32],
        targets: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    );
}

/// Mean squared error: `sum((o - t)^2) / len`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl CostFunction for MeanSquaredError {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn cost(&self, outputs: &[f32], targets: &[f32], pool: &ParallelExecutor) -> f32 {
        let n = outputs.len().max(1) as f32;
        pool.sum(0..outputs.len(), |index| {
            let diff = outputs[index] - targets[index];
            diff * diff
        }) / n
    }

    fn derivatives(
        &self,
        outputs: &[f32],
        targets: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) {
        let n = outputs.len().max(1) as f32;
        pool.map(out, |index, slot| {
            *slot = 2.0 * (outputs[index] - targets[index]) / n;
        });
    }
}

/// Cross entropy against a target distribution: `-sum(t * ln(o + eps))`.
///
/// The epsilon keeps a zero output from producing an infinite cost; outputs
/// are expected to come from a squashing operator such as a sigmoid map.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy;

impl CrossEntropy {
    const EPSILON: f32 = 1e-12;
}

impl CostFunction for CrossEntropy {
    fn name(&self) -> &'static str {
        "cross-entropy"
    }

    fn cost(&self, outputs: &[f32], targets: &[f32], pool: &ParallelExecutor) -> f32 {
        -pool.sum(0..outputs.len(), |index| {
            targets[index] * (outputs[index] + Self::EPSILON).ln()
        })
    }

    fn derivatives(
        &self,
        outputs: &[f32],
        targets: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) {
        pool.map(out, |index, slot| {
            *slot = -targets[index] / (outputs[index] + Self::EPSILON);
        });
    }
}
