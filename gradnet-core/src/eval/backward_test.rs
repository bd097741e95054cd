#[cfg(test)]
mod tests {
    use crate::cost::MeanSquaredError;
    use crate::error::GraphError;
    use crate::graph::Graph;
    use crate::ops::{Dense, Identity, Map, Sum};
    use approx::assert_relative_eq;

    fn mse() -> Box<MeanSquaredError> {
        Box::new(MeanSquaredError)
    }

    #[test]
    fn test_chain_gradients_match_hand_computation() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        let m = graph.add_node(Box::new(Map::new(Identity)), &[d])?;
        graph.set_outputs(&[m])?;
        graph.finalize(mse())?;
        graph.parameters_mut(d)?.copy_from_slice(&[2.0, 0.5]);

        graph.set_input(x, &[1.5])?;
        graph.evaluate()?;
        assert_relative_eq!(graph.value(m)?[0], 3.5);

        // cost = (3.5 - 1)^2, so d(cost)/d(m) = 2 * 2.5 = 5.
        graph.accumulate_gradients(&[1.0])?;
        assert_relative_eq!(graph.delta(m)?[0], 5.0);
        assert_relative_eq!(graph.delta(d)?[0], 5.0);
        assert!(graph.delta(x)?.is_empty());

        let grads = graph.parameter_gradients(d)?;
        assert_relative_eq!(grads[0], 7.5); // d(cost)/dw = delta * x
        assert_relative_eq!(grads[1], 5.0); // d(cost)/db = delta
        Ok(())
    }

    #[test]
    fn test_branch_deltas_sum() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        let m1 = graph.add_node(Box::new(Map::new(Identity)), &[d])?;
        let m2 = graph.add_node(Box::new(Map::new(Identity)), &[d])?;
        graph.set_outputs(&[m1, m2])?;
        graph.finalize(mse())?;
        graph.parameters_mut(d)?.copy_from_slice(&[1.0, 0.0]);

        graph.set_input(x, &[2.0])?;
        graph.evaluate()?;

        // Outputs concatenate to [2, 2] against [1, 0] over n = 2, seeding
        // deltas of 1 and 2; the shared producer collects both.
        graph.accumulate_gradients(&[1.0, 0.0])?;
        assert_relative_eq!(graph.delta(m1)?[0], 1.0);
        assert_relative_eq!(graph.delta(m2)?[0], 2.0);
        assert_relative_eq!(graph.delta(d)?[0], 3.0);

        let grads = graph.parameter_gradients(d)?;
        assert_relative_eq!(grads[0], 6.0);
        assert_relative_eq!(grads[1], 3.0);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_target_length() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let d = graph.add_node(Box::new(Dense::seeded(2, 0)), &[x])?;
        graph.set_outputs(&[d])?;
        graph.finalize(mse())?;
        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;

        assert_eq!(
            graph.accumulate_gradients(&[1.0]),
            Err(GraphError::TargetLength {
                expected: 2,
                actual: 1,
            })
        );
        Ok(())
    }

    #[test]
    fn test_accumulation_replaces_previous_gradients() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        graph.set_outputs(&[d])?;
        graph.finalize(mse())?;
        graph.parameters_mut(d)?.copy_from_slice(&[1.0, 0.0]);

        graph.set_input(x, &[2.0])?;
        graph.evaluate()?;
        graph.accumulate_gradients(&[0.0])?;
        let first = graph.delta(d)?.to_vec();

        graph.accumulate_gradients(&[0.0])?;
        assert_eq!(graph.delta(d)?, first.as_slice());
        Ok(())
    }

    #[test]
    fn test_lagged_gradient_ages_one_step() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        let lagged = graph.add_node(Box::new(Sum::new()), &[d])?;
        graph.set_delay(lagged, 1)?;
        let out = graph.add_node(Box::new(Sum::new()), &[d, lagged])?;
        graph.set_outputs(&[out])?;
        graph.finalize(mse())?;
        graph.parameters_mut(d)?.copy_from_slice(&[1.0, 0.0]);

        // Step 1: out = d + 0 = 1. The gradient of the snapshot is recorded
        // but the aged gradient popped for the lagged node is still zero.
        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;
        assert_relative_eq!(graph.value(out)?[0], 1.0);
        graph.accumulate_gradients(&[0.0])?;
        assert_relative_eq!(graph.delta(out)?[0], 2.0);
        assert_relative_eq!(graph.delta(lagged)?[0], 0.0);
        assert_relative_eq!(graph.delta(d)?[0], 2.0);

        // Step 2: out = d + snapshot = 2, and the lagged node receives the
        // gradient its step-1 snapshot earned, one pass late.
        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;
        assert_relative_eq!(graph.value(out)?[0], 2.0);
        graph.accumulate_gradients(&[0.0])?;
        assert_relative_eq!(graph.delta(out)?[0], 4.0);
        assert_relative_eq!(graph.delta(lagged)?[0], 2.0);
        assert_relative_eq!(graph.delta(d)?[0], 6.0);
        Ok(())
    }
}
