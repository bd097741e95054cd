#[cfg(test)]
mod tests {
    use crate::cost::MeanSquaredError;
    use crate::error::GraphError;
    use crate::graph::node::InputLayout;
    use crate::graph::Graph;
    use crate::ops::{Dense, Sum};

    fn mse() -> Box<MeanSquaredError> {
        Box::new(MeanSquaredError)
    }

    #[test]
    fn test_evaluate_requires_finalization() {
        let mut graph = Graph::new();
        assert_eq!(
            graph.evaluate(),
            Err(GraphError::NotFinalized {
                operation: "evaluate".to_string(),
            })
        );
    }

    #[test]
    fn test_second_pass_is_memoized() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(2)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        graph.set_outputs(&[d])?;
        graph.finalize(mse())?;

        graph.set_input(x, &[1.0, 2.0])?;
        graph.evaluate()?;
        assert_eq!(graph.generation(d)?, 1);
        graph.evaluate()?;
        assert_eq!(graph.generation(d)?, 1);

        graph.mark_stale(x)?;
        graph.evaluate()?;
        assert_eq!(graph.generation(d)?, 2);
        Ok(())
    }

    #[test]
    fn test_partial_invalidation_recomputes_only_downstream() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let a = graph.add_input(1)?;
        let b = graph.add_input(1)?;
        let da = graph.add_node(Box::new(Dense::seeded(1, 0)), &[a])?;
        let db = graph.add_node(Box::new(Dense::seeded(1, 1)), &[b])?;
        let out = graph.add_node(Box::new(Dense::seeded(1, 2)), &[da, db])?;
        graph.set_outputs(&[out])?;
        graph.finalize(mse())?;

        graph.set_input(a, &[1.0])?;
        graph.set_input(b, &[2.0])?;
        graph.evaluate()?;
        assert_eq!(graph.generation(da)?, 1);
        assert_eq!(graph.generation(db)?, 1);

        graph.set_input(a, &[3.0])?;
        graph.evaluate()?;
        assert_eq!(graph.generation(da)?, 2);
        assert_eq!(graph.generation(db)?, 1);
        assert_eq!(graph.generation(out)?, 2);
        Ok(())
    }

    #[test]
    fn test_inputs_start_at_zero() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(2)?;
        let d = graph.add_node(Box::new(Dense::seeded(1, 0)), &[x])?;
        graph.set_outputs(&[d])?;
        graph.finalize(mse())?;

        graph.evaluate()?;
        assert_eq!(graph.value(x)?, &[0.0, 0.0]);
        // Zero inputs against a zero-initialized bias.
        assert_eq!(graph.value(d)?, &[0.0]);
        Ok(())
    }

    #[test]
    fn test_chain_packed_into_shared_group_evaluates_in_place() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let a = graph.add_input(1)?;
        let b = graph.add_input(1)?;
        let u = graph.add_node(Box::new(Sum::new()), &[a, b])?;
        let w = graph.add_node(Box::new(Dense::seeded(1, 0)), &[a, b, u])?;
        graph.set_outputs(&[w])?;
        graph.finalize(mse())?;

        // The sum sits in the same group as its own inputs.
        assert!(matches!(
            graph.nodes[u.index()].layout,
            InputLayout::Packed { .. }
        ));

        graph.parameters_mut(w)?.copy_from_slice(&[1.0, 1.0, 1.0, 0.0]);
        graph.set_input(a, &[1.0])?;
        graph.set_input(b, &[2.0])?;
        graph.evaluate()?;
        assert_eq!(graph.value(u)?, &[3.0]);
        assert_eq!(graph.value(w)?, &[6.0]);
        Ok(())
    }

    #[test]
    fn test_gathered_duplicate_inputs_see_both_copies() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(2)?;
        let doubled = graph.add_node(Box::new(Sum::new()), &[x, x])?;
        graph.set_outputs(&[doubled])?;
        graph.finalize(mse())?;

        graph.set_input(x, &[1.5, -2.0])?;
        graph.evaluate()?;
        assert_eq!(graph.value(doubled)?, &[3.0, -4.0]);
        Ok(())
    }

    #[test]
    fn test_lagged_consumer_reads_staged_snapshot() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let p = graph.add_placeholder(1)?;
        let s = graph.add_node(Box::new(Sum::new()), &[x, p])?;
        graph.replace(p, Box::new(Sum::new()), &[s])?;
        graph.set_delay(p, 1)?;
        graph.set_outputs(&[s])?;
        graph.finalize(mse())?;

        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;
        // The first step reads the prefilled zero history.
        assert_eq!(graph.value(s)?, &[1.0]);
        assert_eq!(graph.steps(), 1);
        {
            let delay = graph.nodes[p.index()].delay.as_ref().expect("lagged");
            assert_eq!(delay.staged, vec![0.0]);
            assert_eq!(delay.values.occupied(), 1);
        }

        graph.set_input(x, &[2.0])?;
        graph.evaluate()?;
        assert_eq!(graph.value(s)?, &[3.0]);
        let delay = graph.nodes[p.index()].delay.as_ref().expect("lagged");
        assert_eq!(delay.staged, vec![1.0]);
        Ok(())
    }

    #[test]
    fn test_noop_pass_leaves_time_alone() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let x = graph.add_input(1)?;
        let p = graph.add_placeholder(1)?;
        let s = graph.add_node(Box::new(Sum::new()), &[x, p])?;
        graph.replace(p, Box::new(Sum::new()), &[s])?;
        graph.set_delay(p, 1)?;
        graph.set_outputs(&[s])?;
        graph.finalize(mse())?;

        graph.set_input(x, &[1.0])?;
        graph.evaluate()?;
        assert_eq!(graph.steps(), 1);

        // Nothing changed; the pass must not move the delay lines.
        graph.evaluate()?;
        assert_eq!(graph.steps(), 1);
        assert_eq!(graph.value(s)?, &[1.0]);

        // Explicit invalidation is what advances time again.
        graph.mark_stale(x)?;
        graph.evaluate()?;
        assert_eq!(graph.steps(), 2);
        assert_eq!(graph.value(s)?, &[2.0]);
        Ok(())
    }
}
