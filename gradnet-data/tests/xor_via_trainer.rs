use gradnet_core::{Dense, Graph, GraphError, Map, MeanSquaredError, Sgd, Tanh};
use gradnet_data::{Trainer, TrainerConfig, VecSupplier};

fn xor_samples() -> Vec<(Vec<f32>, Vec<f32>)> {
    vec![
        (vec![0.0, 0.0], vec![0.0]),
        (vec![0.0, 1.0], vec![1.0]),
        (vec![1.0, 0.0], vec![1.0]),
        (vec![1.0, 1.0], vec![0.0]),
    ]
}

#[test]
fn test_xor_trains_through_the_driver() -> Result<(), GraphError> {
    let mut graph = Graph::new();
    let x = graph.add_input(2)?;
    let hidden = graph.add_node(Box::new(Dense::seeded(4, 11)), &[x])?;
    let squashed = graph.add_node(Box::new(Map::new(Tanh)), &[hidden])?;
    let readout = graph.add_node(Box::new(Dense::seeded(1, 12)), &[squashed])?;
    graph.set_outputs(&[readout])?;
    graph.finalize(Box::new(MeanSquaredError))?;

    let supplier = VecSupplier::new(xor_samples())?;
    let config = TrainerConfig {
        learning_rate: 0.1,
        deferred_updates: false,
    };
    let report = Trainer::with_config(&mut graph, supplier, Sgd::new(), config).run(20_000)?;

    assert_eq!(report.iterations, 20_000);
    assert!(report.final_cost < 0.05, "final cost {}", report.final_cost);

    for (inputs, targets) in &xor_samples() {
        graph.set_input(x, inputs)?;
        graph.evaluate()?;
        let produced = graph.value(readout)?[0];
        assert!(
            (produced - targets[0]).abs() < 0.3,
            "{inputs:?} -> {produced}, wanted {}",
            targets[0]
        );
    }
    Ok(())
}
