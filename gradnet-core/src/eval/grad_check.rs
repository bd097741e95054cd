//! Numerical verification of analytical parameter gradients.

use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradCheckError {
    #[error(
        "parameter {param_index} of {node}: analytical {analytical} vs numerical {numerical} \
         (difference {difference})"
    )]
    Mismatch {
        node: NodeId,
        param_index: usize,
        analytical: f32,
        numerical: f32,
        difference: f32,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Compares one node's analytical parameter gradients against central
/// differences of the cost.
///
/// The graph's inputs must already be set; the function evaluates and
/// accumulates gradients itself. Perturbed re-evaluations replay the current
/// step, so delay lines do not advance; on graphs with lagged edges the
/// comparison therefore covers the same-step part of the gradient only, and
/// the check is meant for feedforward topologies.
///
/// `epsilon` is the perturbation applied to each parameter and `tolerance`
/// bounds the allowed relative difference.
pub fn check_parameter_gradients(
    graph: &mut Graph,
    node: NodeId,
    targets: &[f32],
    epsilon: f32,
    tolerance: f32,
) -> Result<(), GradCheckError> {
    graph.evaluate()?;
    graph.accumulate_gradients(targets)?;
    let analytical = graph.parameter_gradients(node)?;

    graph.computing_gradients = true;
    let result = numerical_sweep(graph, node, targets, epsilon, tolerance, &analytical);
    graph.computing_gradients = false;
    result
}

fn numerical_sweep(
    graph: &mut Graph,
    node: NodeId,
    targets: &[f32],
    epsilon: f32,
    tolerance: f32,
    analytical: &[f32],
) -> Result<(), GradCheckError> {
    for param_index in 0..analytical.len() {
        let original = graph.parameters(node)?[param_index];

        graph.parameters_mut(node)?[param_index] = original + epsilon;
        graph.evaluate()?;
        let cost_plus = graph.cost(targets)?;

        graph.parameters_mut(node)?[param_index] = original - epsilon;
        graph.evaluate()?;
        let cost_minus = graph.cost(targets)?;

        graph.parameters_mut(node)?[param_index] = original;

        let numerical = (cost_plus - cost_minus) / (2.0 * epsilon);
        let difference = (analytical[param_index] - numerical).abs();
        let scale = analytical[param_index]
            .abs()
            .max(numerical.abs())
            .max(1.0);
        if difference > tolerance * scale {
            return Err(GradCheckError::Mismatch {
                node,
                param_index,
                analytical: analytical[param_index],
                numerical,
                difference,
            });
        }
    }
    // Leave the values consistent with the restored parameters.
    graph.evaluate()?;
    Ok(())
}
