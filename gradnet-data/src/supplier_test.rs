#[cfg(test)]
mod tests {
    use crate::supplier::{DataSupplier, Sample, VecSupplier};
    use gradnet_core::GraphError;

    fn counting_samples(count: usize) -> Vec<(Vec<f32>, Vec<f32>)> {
        (0..count)
            .map(|i| (vec![i as f32, -(i as f32)], vec![i as f32 * 10.0]))
            .collect()
    }

    #[test]
    fn test_samples_cycle_by_iteration() -> Result<(), GraphError> {
        let supplier = VecSupplier::new(counting_samples(3))?;
        assert_eq!(supplier.len(), 3);
        assert_eq!(
            supplier.get(1)?,
            Sample {
                inputs: &[1.0, -1.0],
                targets: &[10.0],
            }
        );
        // Iteration 5 wraps around to sample 2.
        assert_eq!(supplier.get(5)?, supplier.get(2)?);
        Ok(())
    }

    #[test]
    fn test_every_iteration_is_a_batch_by_default() -> Result<(), GraphError> {
        let supplier = VecSupplier::new(counting_samples(3))?;
        for iteration in 0..7 {
            assert!(supplier.batch_ended(iteration));
        }
        Ok(())
    }

    #[test]
    fn test_batch_boundaries() -> Result<(), GraphError> {
        let supplier = VecSupplier::with_batch_len(counting_samples(4), 3)?;
        let ended: Vec<bool> = (0..6).map(|i| supplier.batch_ended(i)).collect();
        assert_eq!(ended, vec![false, false, true, false, false, true]);
        Ok(())
    }

    #[test]
    fn test_empty_supplier_is_rejected() {
        assert_eq!(
            VecSupplier::new(Vec::new()).unwrap_err(),
            GraphError::EmptySupplier
        );
    }

    #[test]
    #[should_panic(expected = "batch length must be at least one")]
    fn test_zero_batch_len_is_rejected() {
        let _ = VecSupplier::with_batch_len(counting_samples(2), 0);
    }

    #[test]
    fn test_shuffling_is_reproducible_and_keeps_every_sample() -> Result<(), GraphError> {
        let original = counting_samples(8);
        let first = VecSupplier::shuffled(original.clone(), 1, 7)?;
        let second = VecSupplier::shuffled(original.clone(), 1, 7)?;

        let order = |supplier: &VecSupplier| -> Result<Vec<f32>, GraphError> {
            (0..supplier.len())
                .map(|i| Ok(supplier.get(i)?.inputs[0]))
                .collect()
        };
        assert_eq!(order(&first)?, order(&second)?);

        let mut seen = order(&first)?;
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(seen, expected);
        Ok(())
    }
}
