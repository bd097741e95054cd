//! Weight initialization.

use crate::error::GraphError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Builds the generator all initialization draws from.
///
/// Passing a seed makes finalization reproducible, which training tests and
/// the gradient checker rely on.
pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Samples `len` values uniformly from `[low, high)`.
///
/// # Panics
///
/// Panics if `low >= high`.
pub fn uniform(rng: &mut StdRng, len: usize, low: f32, high: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(low..high)).collect()
}

/// Samples `len` values from a normal distribution.
pub fn normal(
    rng: &mut StdRng,
    len: usize,
    mean: f32,
    std_dev: f32,
) -> Result<Vec<f32>, GraphError> {
    let dist = Normal::new(mean, std_dev).map_err(|e| GraphError::InvalidInit {
        reason: e.to_string(),
    })?;
    Ok((0..len).map(|_| dist.sample(rng)).collect())
}

/// Xavier/Glorot uniform: bound `sqrt(6 / (fan_in + fan_out))`.
pub fn xavier_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Vec<f32> {
    let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
    uniform(rng, fan_in * fan_out, -bound, bound)
}

/// How an adjustable operator fills its weight matrix at finalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitScheme {
    /// Xavier/Glorot uniform, scaled by fan-in and fan-out.
    XavierUniform,
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
}

impl InitScheme {
    /// Samples a `fan_out x fan_in` weight matrix, flattened row-major.
    pub fn sample(
        &self,
        rng: &mut StdRng,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Vec<f32>, GraphError> {
        match *self {
            InitScheme::XavierUniform => Ok(xavier_uniform(rng, fan_in, fan_out)),
            InitScheme::Uniform { low, high } => Ok(uniform(rng, fan_in * fan_out, low, high)),
            InitScheme::Normal { mean, std_dev } => normal(rng, fan_in * fan_out, mean, std_dev),
        }
    }
}
