use crate::error::GraphError;
use crate::graph::NodeId;
use crate::optim::Optimizer;
use std::collections::HashMap;

/// Stochastic gradient descent with optional momentum.
///
/// With momentum `m`, each parameter keeps a velocity
/// `v = m * v - learning_rate * gradient` and the velocity is what moves the
/// target. Velocities are allocated lazily per node on first use.
#[derive(Debug, Default)]
pub struct Sgd {
    momentum: f32,
    velocity: HashMap<NodeId, Vec<f32>>,
}

impl Sgd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_momentum(momentum: f32) -> Self {
        Sgd {
            momentum,
            velocity: HashMap::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn run(
        &mut self,
        node: NodeId,
        gradients: &[f32],
        target: &mut [f32],
        learning_rate: f32,
    ) -> Result<(), GraphError> {
        debug_assert_eq!(gradients.len(), target.len());
        if self.momentum == 0.0 {
            for (slot, gradient) in target.iter_mut().zip(gradients) {
                *slot -= learning_rate * gradient;
            }
            return Ok(());
        }
        let momentum = self.momentum;
        let velocity = self
            .velocity
            .entry(node)
            .or_insert_with(|| vec![0.0; gradients.len()]);
        for ((slot, gradient), v) in target.iter_mut().zip(gradients).zip(velocity.iter_mut()) {
            *v = momentum * *v - learning_rate * gradient;
            *slot += *v;
        }
        Ok(())
    }
}
