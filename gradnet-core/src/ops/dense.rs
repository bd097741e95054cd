// gradnet-core/src/ops/dense.rs

use crate::error::GraphError;
use crate::exec::ParallelExecutor;
use crate::graph::NodeId;
use crate::init::{rng_for, InitScheme};
use crate::ops::{AdjustableOperator, GradContext, Operator};
use std::fs;
use std::path::{Path, PathBuf};

/// Fully connected layer: `out = W * inputs + b`.
///
/// The weight matrix is `units x in_len`, where `in_len` is the node's total
/// input length, fixed at finalization. Parameters are exposed flat as the
/// row-major weights followed by the biases.
#[derive(Debug)]
pub struct Dense {
    units: usize,
    in_len: usize,
    params: Vec<f32>,
    staged: Vec<f32>,
    scheme: InitScheme,
    seed: Option<u64>,
}

impl Dense {
    pub fn new(units: usize) -> Self {
        Self::with_init(units, InitScheme::XavierUniform, None)
    }

    /// A layer whose weights are drawn reproducibly from `seed`.
    pub fn seeded(units: usize, seed: u64) -> Self {
        Self::with_init(units, InitScheme::XavierUniform, Some(seed))
    }

    pub fn with_init(units: usize, scheme: InitScheme, seed: Option<u64>) -> Self {
        Dense {
            units,
            in_len: 0,
            params: Vec::new(),
            staged: Vec::new(),
            scheme,
            seed,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    fn weight_len(&self) -> usize {
        self.units * self.in_len
    }

    /// The row-major `units x in_len` weight matrix.
    pub fn weights(&self) -> &[f32] {
        &self.params[..self.weight_len()]
    }

    pub fn bias(&self) -> &[f32] {
        &self.params[self.weight_len()..]
    }

    fn weight_file(&self, dir: &Path, node: NodeId) -> PathBuf {
        dir.join(format!("node-{}.dense.txt", node.index()))
    }

    fn parse_weight_file(&self, path: &Path, text: &str) -> Result<Vec<f32>, GraphError> {
        let invalid = |reason: String| GraphError::InvalidWeightFile {
            path: path.to_path_buf(),
            reason,
        };
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| invalid("empty file".into()))?;
        let dims: Vec<usize> = header
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| invalid(format!("bad header: {e}")))?;
        if dims != [self.units, self.in_len] {
            return Err(invalid(format!(
                "dimensions {dims:?} do not match this layer ({} x {})",
                self.units, self.in_len
            )));
        }
        let mut values = Vec::with_capacity(self.param_len());
        for line in lines {
            for field in line.split_whitespace() {
                let value: f32 = field
                    .parse()
                    .map_err(|e| invalid(format!("bad value {field:?}: {e}")))?;
                values.push(value);
            }
        }
        if values.len() != self.param_len() {
            return Err(invalid(format!(
                "expected {} values, found {}",
                self.param_len(),
                values.len()
            )));
        }
        Ok(values)
    }
}

impl Operator for Dense {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn output_len(&self, input_lens: &[usize]) -> Result<usize, GraphError> {
        if input_lens.is_empty() {
            return Err(GraphError::IncompatibleInputs {
                operation: "dense".to_string(),
                lens: input_lens.to_vec(),
            });
        }
        Ok(self.units)
    }

    fn init(&mut self, input_lens: &[usize], output_len: usize) -> Result<(), GraphError> {
        debug_assert_eq!(output_len, self.units);
        self.in_len = input_lens.iter().sum();
        let mut rng = rng_for(self.seed);
        self.params = self.scheme.sample(&mut rng, self.in_len, self.units)?;
        self.params.resize(self.weight_len() + self.units, 0.0);
        self.staged = vec![0.0; self.params.len()];
        Ok(())
    }

    fn evaluate(
        &self,
        inputs: &[f32],
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        debug_assert_eq!(inputs.len(), self.in_len);
        debug_assert_eq!(out.len(), self.units);
        let weights = self.weights();
        let bias = self.bias();
        let in_len = self.in_len;
        pool.map(out, |unit, slot| {
            let row = &weights[unit * in_len..(unit + 1) * in_len];
            let mut acc = bias[unit];
            for (w, x) in row.iter().zip(inputs) {
                acc += w * x;
            }
            *slot = acc;
        });
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
        let weights = self.weights();
        let units = self.units;
        let in_len = self.in_len;
        pool.map(contribution, |index, slot| {
            let column = offset + index;
            let mut acc = 0.0;
            for unit in 0..units {
                acc += ctx.delta[unit] * weights[unit * in_len + column];
            }
            *slot = acc;
        });
        Ok(())
    }

    fn as_adjustable(&self) -> Option<&dyn AdjustableOperator> {
        Some(self)
    }

    fn as_adjustable_mut(&mut self) -> Option<&mut dyn AdjustableOperator> {
        Some(self)
    }

    fn save(&self, dir: &Path, node: NodeId) -> Result<(), GraphError> {
        let path = self.weight_file(dir, node);
        let mut text = format!("{} {}\n", self.units, self.in_len);
        let join = |values: &[f32]| {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        text.push_str(&join(self.weights()));
        text.push('\n');
        text.push_str(&join(self.bias()));
        text.push('\n');
        fs::write(&path, text).map_err(|e| GraphError::io(&path, e))
    }

    fn load(&mut self, dir: &Path, node: NodeId) -> Result<(), GraphError> {
        let path = self.weight_file(dir, node);
        let text = fs::read_to_string(&path).map_err(|e| GraphError::io(&path, e))?;
        self.params = self.parse_weight_file(&path, &text)?;
        Ok(())
    }
}

impl AdjustableOperator for Dense {
    fn param_len(&self) -> usize {
        self.params.len()
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn param_gradients(
        &self,
        ctx: &GradContext<'_>,
        out: &mut [f32],
        pool: &ParallelExecutor,
    ) -> Result<(), GraphError> {
        debug_assert_eq!(out.len(), self.param_len());
        let weight_len = self.weight_len();
        let in_len = self.in_len;
        pool.map(out, |param, slot| {
            *slot = if param < weight_len {
                ctx.delta[param / in_len] * ctx.inputs[param % in_len]
            } else {
                ctx.delta[param - weight_len]
            };
        });
        Ok(())
    }

    fn staged_mut(&mut self) -> &mut [f32] {
        &mut self.staged
    }

    fn commit_staged(&mut self) {
        for (param, staged) in self.params.iter_mut().zip(&self.staged) {
            *param += *staged;
        }
        self.staged.fill(0.0);
    }
}
