use gradnet_core::{Dense, Graph, GraphError, MeanSquaredError, Sgd, Sum};

#[test]
fn test_running_sum_accumulates_across_steps() -> Result<(), GraphError> {
    let mut graph = Graph::new();
    let x = graph.add_input(1)?;
    let feedback = graph.add_placeholder(1)?;
    let total = graph.add_node(Box::new(Sum::new()), &[x, feedback])?;
    graph.replace(feedback, Box::new(Sum::new()), &[total])?;
    graph.set_delay(feedback, 1)?;
    graph.set_outputs(&[total])?;
    graph.finalize(Box::new(MeanSquaredError))?;

    let mut produced = Vec::new();
    for step in 1..=3 {
        graph.set_input(x, &[step as f32])?;
        graph.evaluate()?;
        produced.push(graph.value(total)?[0]);
    }
    assert_eq!(produced, vec![1.0, 3.0, 6.0]);
    assert_eq!(graph.steps(), 3);
    Ok(())
}

#[test]
fn test_two_step_delay_line() -> Result<(), GraphError> {
    let mut graph = Graph::new();
    let x = graph.add_input(1)?;
    graph.set_delay(x, 2)?;
    let echoed = graph.add_node(Box::new(Sum::new()), &[x])?;
    graph.set_outputs(&[echoed])?;
    graph.finalize(Box::new(MeanSquaredError))?;

    let fed = [10.0, 20.0, 30.0, 40.0];
    let mut heard = Vec::new();
    for value in fed {
        graph.set_input(x, &[value])?;
        graph.evaluate()?;
        heard.push(graph.value(echoed)?[0]);
    }
    // Two steps of prefilled zero history, then the feed replays.
    assert_eq!(heard, vec![0.0, 0.0, 10.0, 20.0]);
    Ok(())
}

#[test]
fn test_recurrent_cell_learns_a_fixed_point() -> Result<(), GraphError> {
    // One linear cell fed by the input and its own previous output. Driving
    // the output toward a constant target exercises the gradient snapshots
    // ageing through the delay line while the weights move every pass.
    let mut graph = Graph::new();
    let x = graph.add_input(1)?;
    let feedback = graph.add_placeholder(1)?;
    let cell = graph.add_node(Box::new(Dense::seeded(1, 4)), &[x, feedback])?;
    graph.replace(feedback, Box::new(Sum::new()), &[cell])?;
    graph.set_delay(feedback, 1)?;
    graph.set_outputs(&[cell])?;
    graph.finalize(Box::new(MeanSquaredError))?;
    graph.parameters_mut(cell)?.copy_from_slice(&[0.0, 0.0, 0.0]);

    let mut sgd = Sgd::new();
    let mut first_cost = None;
    let mut last_cost = 0.0;
    for _ in 0..200 {
        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;
        last_cost = graph.cost(&[1.0])?;
        first_cost.get_or_insert(last_cost);
        graph.accumulate_gradients(&[1.0])?;
        graph.adjust_weights(&mut sgd, 0.1, false)?;
    }

    let first_cost = first_cost.expect("loop ran");
    assert!(
        last_cost < 0.01 && last_cost < first_cost,
        "cost went from {first_cost} to {last_cost}"
    );
    Ok(())
}
