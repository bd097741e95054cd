use gradnet_core::{Dense, Graph, GraphError, Map, MeanSquaredError, NodeId, Tanh};

/// The four XOR samples as (inputs, target) pairs.
#[allow(dead_code)]
pub fn xor_samples() -> Vec<(Vec<f32>, Vec<f32>)> {
    vec![
        (vec![0.0, 0.0], vec![0.0]),
        (vec![0.0, 1.0], vec![1.0]),
        (vec![1.0, 0.0], vec![1.0]),
        (vec![1.0, 1.0], vec![0.0]),
    ]
}

/// A 2 -> hidden -> 1 network with a tanh squash in the middle.
///
/// Returns the graph plus the input handle and the two dense layers.
#[allow(dead_code)]
pub fn xor_graph(
    hidden: usize,
    seed: u64,
) -> Result<(Graph, NodeId, NodeId, NodeId), GraphError> {
    let mut graph = Graph::new();
    let x = graph.add_input(2)?;
    let stack = graph.add_node(Box::new(Dense::seeded(hidden, seed)), &[x])?;
    let squashed = graph.add_node(Box::new(Map::new(Tanh)), &[stack])?;
    let readout = graph.add_node(Box::new(Dense::seeded(1, seed + 1)), &[squashed])?;
    graph.set_outputs(&[readout])?;
    graph.finalize(Box::new(MeanSquaredError))?;
    Ok((graph, x, stack, readout))
}
