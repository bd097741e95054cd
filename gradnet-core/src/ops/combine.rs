use crate::error::GraphError;
use crate::exec::ParallelExecutor;
use crate::ops::{GradContext, Operator};

/// Adds equally-sized input vectors element by element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Sum {
    pub fn new() -> Self {
        Sum
    }
}

impl Operator for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn output_len(&self, input_lens: &[usize]) -> Result<usize, GraphError> {
        let Some(&first) = input_lens.first() else {
            return Err(GraphError::IncompatibleInputs {
                operation: "sum".to_string(),
                lens: input_lens.to_vec(),
            });
        };
        if input_lens.iter().any(|&len| len != first) {
            return Err(GraphError::IncompatibleInputs {
                operation: "sum".to_string(),
                lens: input_lens.to_vec(),
            });
        }
        Ok(first)
    }

    fn evaluate(
        &self,
        inputs: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        let width = out.len();
        debug_assert!(width > 0 && inputs.len() % width == 0);
        pool.map(out, |index, slot| {
            let mut acc = 0.0;
            let mut at = index;
            while at < inputs.len() {
                acc += inputs[at];
                at += width;
            }
            *slot = acc;
        });
        Ok(())
    }

    /// The sum routes its gradient through every edge unchanged.
    fn input_gradient(
        &self,
        ctx: &GradContext<'_>,
        _edge: usize,
        contribution: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        pool.map(contribution, |index, slot| *slot = ctx.delta[index]);
        Ok(())
    }
}
