//! # Training XOR on an evaluation graph
//!
//! This example walks through the whole life of a graph:
//!
//! 1. **Wiring**: an input node, a hidden `Dense` layer squashed through
//!    `Tanh`, and a single-unit readout layer.
//! 2. **Finalization** with a mean squared error cost, which packs the node
//!    buffers and seeds the weights.
//! 3. **Training loop**: evaluate, accumulate gradients, adjust weights with
//!    plain stochastic gradient descent, one sample at a time.
//! 4. **Inspection**: reading the trained predictions back out.
//!
//! ## Running
//!
//! `cargo run --example xor`

use gradnet_core::{Dense, Graph, GraphError, Map, MeanSquaredError, Sgd, Tanh};

fn main() -> Result<(), GraphError> {
    let samples: [(&[f32], &[f32]); 4] = [
        (&[0.0, 0.0], &[0.0]),
        (&[0.0, 1.0], &[1.0]),
        (&[1.0, 0.0], &[1.0]),
        (&[1.0, 1.0], &[0.0]),
    ];

    let mut graph = Graph::new();
    let x = graph.add_input(2)?;
    let hidden = graph.add_node(Box::new(Dense::seeded(4, 11)), &[x])?;
    let squashed = graph.add_node(Box::new(Map::new(Tanh)), &[hidden])?;
    let readout = graph.add_node(Box::new(Dense::seeded(1, 12)), &[squashed])?;
    graph.set_outputs(&[readout])?;
    graph.finalize(Box::new(MeanSquaredError))?;

    let mut sgd = Sgd::new();
    let learning_rate = 0.1;
    let epochs = 5000;

    for epoch in 0..epochs {
        let mut epoch_cost = 0.0;
        for (inputs, targets) in &samples {
            graph.set_input(x, inputs)?;
            graph.evaluate()?;
            epoch_cost += graph.cost(targets)?;
            graph.accumulate_gradients(targets)?;
            graph.adjust_weights(&mut sgd, learning_rate, false)?;
        }
        if epoch % 500 == 0 {
            println!(
                "epoch {:>4}: mean cost {:.6}",
                epoch,
                epoch_cost / samples.len() as f32
            );
        }
    }

    println!("\ntrained predictions:");
    for (inputs, targets) in &samples {
        graph.set_input(x, inputs)?;
        graph.evaluate()?;
        println!(
            "  {:?} -> {:.4} (target {})",
            inputs,
            graph.value(readout)?[0],
            targets[0]
        );
    }
    Ok(())
}
