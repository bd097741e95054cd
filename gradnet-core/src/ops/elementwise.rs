use crate::error::GraphError;
use crate::exec::ParallelExecutor;
use crate::ops::{GradContext, Operator};
use std::fmt;

/// A scalar function and its derivative, applied element by element.
pub trait Elementwise: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn value(&self, x: f32) -> f32;

    /// `dy/dx` at `x`, with `y = value(x)` passed in so implementations can
    /// reuse the forward result.
    fn slope(&self, x: f32, y: f32) -> f32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Elementwise for Sigmoid {
    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn value(&self, x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    fn slope(&self, _x: f32, y: f32) -> f32 {
        y * (1.0 - y)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Elementwise for Tanh {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn value(&self, x: f32) -> f32 {
        x.tanh()
    }

    fn slope(&self, _x: f32, y: f32) -> f32 {
        1.0 - y * y
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Elementwise for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn value(&self, x: f32) -> f32 {
        x.max(0.0)
    }

    fn slope(&self, x: f32, _y: f32) -> f32 {
        if x > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Elementwise for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn value(&self, x: f32) -> f32 {
        x
    }

    fn slope(&self, _x: f32, _y: f32) -> f32 {
        1.0
    }
}

/// Applies one scalar function to every element of the concatenated inputs.
///
/// The output length is the total input length, so a `Map` doubles as a
/// concatenation of its input edges.
#[derive(Debug, Clone, Copy)]
pub struct Map<E: Elementwise> {
    unit: E,
}

impl<E: Elementwise> Map<E> {
    pub fn new(unit: E) -> Self {
        Map { unit }
    }
}

impl<E: Elementwise> Operator for Map<E> {
    fn name(&self) -> &'static str {
        self.unit.name()
    }

    fn output_len(&self, input_lens: &[usize]) -> Result<usize, GraphError> {
        if input_lens.is_empty() {
            return Err(GraphError::IncompatibleInputs {
                operation: self.name().to_string(),
                lens: input_lens.to_vec(),
            });
        }
        Ok(input_lens.iter().sum())
    }

    fn evaluate(
        &self,
        inputs: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        debug_assert_eq!(inputs.len(), out.len());
        pool.map(out, |index, slot| *slot = self.unit.value(inputs[index]));
        Ok(())
    }

    fn input_gradient(
        &self,
        ctx: &GradContext<'_>,
        edge: usize,
        contribution: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        let offset = ctx.edge_offset(edge);
        pool.map(contribution, |index, slot| {
            let at = offset + index;
            *slot = ctx.delta[at] * self.unit.slope(ctx.inputs[at], ctx.values[at]);
        });
        Ok(())
    }
}
