//! # Training XOR through the supplier and trainer
//!
//! The companion to gradnet-core's `xor` example: the same network, but the
//! training loop is handed to [`Trainer`] with a [`VecSupplier`] cycling the
//! four XOR rows, instead of being written by hand.
//!
//! ## Running
//!
//! `cargo run --example train_xor`

use gradnet_core::{Dense, Graph, GraphError, Map, MeanSquaredError, Sgd, Tanh};
use gradnet_data::{Trainer, TrainerConfig, VecSupplier};

fn main() -> Result<(), GraphError> {
    let samples = vec![
        (vec![0.0, 0.0], vec![0.0]),
        (vec![0.0, 1.0], vec![1.0]),
        (vec![1.0, 0.0], vec![1.0]),
        (vec![1.0, 1.0], vec![0.0]),
    ];

    let mut graph = Graph::new();
    let x = graph.add_input(2)?;
    let hidden = graph.add_node(Box::new(Dense::seeded(4, 11)), &[x])?;
    let squashed = graph.add_node(Box::new(Map::new(Tanh)), &[hidden])?;
    let readout = graph.add_node(Box::new(Dense::seeded(1, 12)), &[squashed])?;
    graph.set_outputs(&[readout])?;
    graph.finalize(Box::new(MeanSquaredError))?;

    let supplier = VecSupplier::new(samples.clone())?;
    let config = TrainerConfig {
        learning_rate: 0.1,
        deferred_updates: false,
    };
    let report = Trainer::with_config(&mut graph, supplier, Sgd::new(), config).run(20_000)?;
    println!(
        "trained {} iterations: mean cost {:.6}, final cost {:.6}",
        report.iterations, report.mean_cost, report.final_cost
    );

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
