#[cfg(test)]
mod tests {
    use crate::error::GraphError;
    use crate::graph::NodeId;
    use crate::optim::{Optimizer, Sgd};

    fn assert_vec_f32_eq(a: &[f32], b: &[f32], epsilon: f32) {
        assert_eq!(a.len(), b.len(), "vector lengths differ");
        for (index, (left, right)) in a.iter().zip(b.iter()).enumerate() {
            if (left - right).abs() > epsilon {
                panic!("mismatch at index {index}: left = {left}, right = {right}");
            }
        }
    }

    #[test]
    fn test_basic_step() -> Result<(), GraphError> {
        let mut optimizer = Sgd::new();
        let mut params = vec![1.0, 2.0, 3.0, 4.0];
        let grads = vec![0.1, 0.2, 0.3, 0.4];
        optimizer.run(NodeId(0), &grads, &mut params, 0.1)?;

        let expected: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0]
            .iter()
            .zip(&grads)
            .map(|(p, g)| p - 0.1 * g)
            .collect();
        assert_vec_f32_eq(&params, &expected, 1e-6);
        Ok(())
    }

    #[test]
    fn test_step_adds_into_staged_target() -> Result<(), GraphError> {
        // A nonzero target stands in for a staged buffer holding an earlier
        // update of the same batch.
        let mut optimizer = Sgd::new();
        let mut staged = vec![0.5, 0.5];
        optimizer.run(NodeId(0), &[1.0, -1.0], &mut staged, 0.1)?;
        assert_vec_f32_eq(&staged, &[0.4, 0.6], 1e-6);
        Ok(())
    }

    #[test]
    fn test_momentum_accumulates_velocity() -> Result<(), GraphError> {
        let mut optimizer = Sgd::with_momentum(0.9);
        let mut params = vec![0.0];
        optimizer.run(NodeId(0), &[1.0], &mut params, 0.1)?;
        // v = -0.1
        assert_vec_f32_eq(&params, &[-0.1], 1e-6);
        optimizer.run(NodeId(0), &[1.0], &mut params, 0.1)?;
        // v = 0.9 * -0.1 - 0.1 = -0.19
        assert_vec_f32_eq(&params, &[-0.29], 1e-6);
        Ok(())
    }

    #[test]
    fn test_momentum_state_is_per_node() -> Result<(), GraphError> {
        let mut optimizer = Sgd::with_momentum(0.9);
        let mut first = vec![0.0];
        let mut second = vec![0.0];
        optimizer.run(NodeId(0), &[1.0], &mut first, 0.1)?;
        optimizer.run(NodeId(1), &[1.0], &mut second, 0.1)?;
        // The second node sees no velocity from the first.
        assert_vec_f32_eq(&first, &second, 1e-6);
        Ok(())
    }
}
