#[cfg(test)]
mod tests {
    use crate::graph::group::{in_out, NodeGroup};
    use crate::graph::NodeId;

    fn ids(indices: &[usize]) -> Vec<NodeId> {
        indices.iter().map(|&i| NodeId(i)).collect()
    }

    #[test]
    fn test_member_ranges_are_cumulative() {
        let group = NodeGroup::build(ids(&[0, 1, 2]), &[2, 3, 1], false);
        assert_eq!(group.member_range(0), 0..2);
        assert_eq!(group.member_range(1), 2..5);
        assert_eq!(group.member_range(2), 5..6);
        assert_eq!(group.value_of(1).len(), 3);
    }

    #[test]
    fn test_deltas_only_backed_on_request() {
        let mut plain = NodeGroup::build(ids(&[0]), &[4], false);
        assert!(!plain.has_deltas());
        assert!(plain.delta_of(0).is_empty());
        assert!(plain.delta_of_mut(0).is_empty());

        let mut backed = NodeGroup::build(ids(&[0]), &[4], true);
        assert!(backed.has_deltas());
        backed.delta_of_mut(0).fill(2.5);
        backed.clear_deltas();
        assert_eq!(backed.delta_of(0), &[0.0; 4]);
    }

    #[test]
    fn test_in_out_across_groups() {
        let mut groups = vec![
            NodeGroup::build(ids(&[0]), &[2], false),
            NodeGroup::build(ids(&[1]), &[3], false),
        ];
        groups[0].value_of_mut(0).copy_from_slice(&[1.0, 2.0]);

        let (input, out) = in_out(&mut groups, 0, 0..2, 1, 0..3);
        assert_eq!(input, &[1.0, 2.0]);
        out.fill(7.0);
        assert_eq!(groups[1].value_of(0), &[7.0; 3]);
    }

    #[test]
    fn test_in_out_within_one_group() {
        // Members: inputs at 0..2 and 2..4, a packed consumer at 4..5.
        let mut groups = vec![NodeGroup::build(ids(&[0, 1, 2]), &[2, 2, 1], false)];
        groups[0].value_of_mut(0).copy_from_slice(&[1.0, 2.0]);
        groups[0].value_of_mut(1).copy_from_slice(&[3.0, 4.0]);

        let (input, out) = in_out(&mut groups, 0, 0..4, 0, 4..5);
        assert_eq!(input, &[1.0, 2.0, 3.0, 4.0]);
        out[0] = input.iter().sum();
        assert_eq!(groups[0].value_of(2), &[10.0]);
    }

    #[test]
    fn test_in_out_with_output_before_input() {
        let mut groups = vec![NodeGroup::build(ids(&[0, 1]), &[1, 2], false)];
        groups[0].value_of_mut(1).copy_from_slice(&[5.0, 6.0]);

        let (input, out) = in_out(&mut groups, 0, 1..3, 0, 0..1);
        assert_eq!(input, &[5.0, 6.0]);
        out[0] = input[0] + input[1];
        assert_eq!(groups[0].value_of(0), &[11.0]);
    }
}
