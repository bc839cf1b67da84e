//! Property-based tests for the M-tree
//!
//! These tests use proptest to generate random value sets and node
//! capacities and verify after arbitrary insertion sequences:
//! 1. Every node respects the capacity and every leaf sits at the same depth
//! 2. Covering radii bound the distance to every value in the subtree
//! 3. Every inserted value is found, and the size matches the insert count
//! 4. Range and k-NN answers match a linear scan

use m_tree::{AbsoluteDifference, Distance, Levenshtein, MTree, Manhattan, Node};
use proptest::prelude::*;

/// Largest distance from `router` to any value stored under `node`
fn max_distance<V, D: Distance<V>>(node: &Node<V>, router: &V, distance: &D) -> f64 {
    node.values()
        .map(|v| distance.distance(router, v))
        .fold(0.0, f64::max)
}

/// Walk every routing entry and check its covering radius directly
fn assert_radii_cover<V, D: Distance<V>>(
    node: &Node<V>,
    distance: &D,
) -> Result<(), TestCaseError> {
    if let Some(entries) = node.routing_entries() {
        for entry in entries {
            let reach = max_distance(&entry.child, &entry.value, distance);
            prop_assert!(
                reach <= entry.covering_radius + 1e-9,
                "covering radius {} but a value lies at {}",
                entry.covering_radius,
                reach
            );
            assert_radii_cover(&entry.child, distance)?;
        }
    }
    Ok(())
}

/// Every node holds at most `capacity` entries
fn assert_capacity<V>(node: &Node<V>, capacity: usize) -> Result<(), TestCaseError> {
    prop_assert!(node.len() <= capacity);
    if let Some(entries) = node.routing_entries() {
        for entry in entries {
            prop_assert!(!entry.child.is_empty());
            assert_capacity(&entry.child, capacity)?;
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_scalar_tree_invariants(
        values in prop::collection::vec(-500i64..500, 0..300),
        capacity in 2usize..=4,
    ) {
        let tree =
            MTree::from_values(AbsoluteDifference, capacity, values.iter().copied()).unwrap();

        prop_assert_eq!(tree.len(), values.len());
        prop_assert_eq!(tree.iter().count(), values.len());
        assert_capacity(tree.root(), capacity)?;
        assert_radii_cover(tree.root(), &AbsoluteDifference)?;
        prop_assert!(tree.verify_integrity().is_ok());

        for v in &values {
            prop_assert!(tree.contains(v));
        }
    }

    #[test]
    fn prop_string_tree_invariants(
        words in prop::collection::vec("[a-d]{0,6}", 0..120),
        capacity in 2usize..=4,
    ) {
        let tree = MTree::from_values(Levenshtein, capacity, words.iter().cloned()).unwrap();

        prop_assert_eq!(tree.len(), words.len());
        assert_capacity(tree.root(), capacity)?;
        assert_radii_cover(tree.root(), &Levenshtein)?;
        prop_assert!(tree.verify_integrity().is_ok());

        for w in &words {
            prop_assert!(tree.contains(w));
        }
    }

    #[test]
    fn prop_contains_only_inserted(
        values in prop::collection::vec(0i64..100, 1..80),
        probe in 0i64..100,
        capacity in 2usize..=4,
    ) {
        let tree =
            MTree::from_values(AbsoluteDifference, capacity, values.iter().copied()).unwrap();
        prop_assert_eq!(tree.contains(&probe), values.contains(&probe));
    }

    #[test]
    fn prop_range_matches_linear_scan(
        points in prop::collection::vec((-30i32..30, -30i32..30), 0..150),
        query in (-40i32..40, -40i32..40),
        radius in 0u32..25,
        capacity in 2usize..=4,
    ) {
        let tree = MTree::from_values(Manhattan, capacity, points.iter().copied()).unwrap();
        let radius = radius as f64;

        let mut found: Vec<_> = tree.range(&query, radius).copied().collect();
        let mut expected: Vec<_> = points
            .iter()
            .copied()
            .filter(|p| Manhattan.distance(&query, p) <= radius)
            .collect();
        found.sort();
        expected.sort();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_knn_matches_linear_scan(
        values in prop::collection::vec(-200i64..200, 0..150),
        query in -250i64..250,
        k in 0usize..40,
        capacity in 2usize..=4,
    ) {
        let tree =
            MTree::from_values(AbsoluteDifference, capacity, values.iter().copied()).unwrap();

        let hits = tree.knn_with_distances(&query, k);
        prop_assert_eq!(hits.len(), k.min(values.len()));

        let mut expected: Vec<f64> = values
            .iter()
            .map(|v| AbsoluteDifference.distance(&query, v))
            .collect();
        expected.sort_by(|a, b| a.total_cmp(b));
        expected.truncate(k);

        let found: Vec<f64> = hits.iter().map(|n| n.distance).collect();
        prop_assert_eq!(found, expected);
    }
}
