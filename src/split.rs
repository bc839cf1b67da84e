//! Node splitting: promotion and partition.
//!
//! Triggered when a node holds M + 1 entries. The split works the same way
//! for leaves and internal nodes:
//!
//! 1. **Promotion**: compute every pairwise distance once and promote the
//!    two entries that are farthest apart. Far-apart routing objects give
//!    the two halves the least overlap.
//! 2. **Partition**: every other entry joins the closer promoted entry. A
//!    tie goes to the first promoted entry.
//! 3. **Radius**: each half gets a covering radius relative to its own
//!    routing object. For internal entries the child's own radius is added,
//!    so the bound covers the whole subtree.
//!
//! The distance matrix is reused for partitioning and for the new
//! `distance_to_parent` values, so a split costs exactly `n(n-1)/2` distance
//! calls for `n = M + 1` entries.

use tracing::debug;

use crate::distance::Distance;
use crate::node::{LeafEntry, Node, RoutingEntry};

/// An entry kind that can be redistributed by a split.
pub(crate) trait SplitEntry<V>: Sized {
    fn value(&self) -> &V;

    fn set_distance_to_parent(&mut self, distance: f64);

    /// How far this entry's subtree extends beyond its own value.
    fn reach(&self) -> f64;

    fn into_node(entries: Vec<Self>) -> Node<V>;
}

impl<V> SplitEntry<V> for LeafEntry<V> {
    fn value(&self) -> &V {
        &self.value
    }

    fn set_distance_to_parent(&mut self, distance: f64) {
        self.distance_to_parent = Some(distance);
    }

    fn reach(&self) -> f64 {
        0.0
    }

    fn into_node(entries: Vec<Self>) -> Node<V> {
        Node::Leaf(entries)
    }
}

impl<V> SplitEntry<V> for RoutingEntry<V> {
    fn value(&self) -> &V {
        &self.value
    }

    fn set_distance_to_parent(&mut self, distance: f64) {
        self.distance_to_parent = Some(distance);
    }

    fn reach(&self) -> f64 {
        self.covering_radius
    }

    fn into_node(entries: Vec<Self>) -> Node<V> {
        Node::Internal(entries)
    }
}

/// Symmetric matrix of pairwise distances between entries.
struct DistanceMatrix {
    n: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    fn build<V, E, D>(entries: &[E], distance: &D) -> Self
    where
        E: SplitEntry<V>,
        D: Distance<V> + ?Sized,
    {
        let n = entries.len();
        let mut cells = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance.distance(entries[i].value(), entries[j].value());
                cells[i * n + j] = d;
                cells[j * n + i] = d;
            }
        }
        Self { n, cells }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.n + j]
    }

    /// Farthest pair `(i, j)` with `i < j`; the first maximum in scan order wins.
    fn farthest_pair(&self) -> (usize, usize) {
        let mut best = (0, 1);
        let mut best_distance = f64::NEG_INFINITY;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let d = self.get(i, j);
                if d > best_distance {
                    best_distance = d;
                    best = (i, j);
                }
            }
        }
        best
    }
}

/// Split `entries` (exactly `capacity + 1` of them) into two routing entries
/// whose children are nodes of the same kind as the input.
///
/// The returned entries have no `distance_to_parent` yet; the caller knows
/// which routing object (if any) they will sit under.
pub(crate) fn split<V, E, D>(
    entries: Vec<E>,
    capacity: usize,
    distance: &D,
) -> (RoutingEntry<V>, RoutingEntry<V>)
where
    V: Clone,
    E: SplitEntry<V>,
    D: Distance<V> + ?Sized,
{
    assert_eq!(
        entries.len(),
        capacity + 1,
        "split requires exactly capacity + 1 entries"
    );

    let matrix = DistanceMatrix::build(&entries, distance);
    let (a, b) = matrix.farthest_pair();
    let router_a = entries[a].value().clone();
    let router_b = entries[b].value().clone();

    let mut group_a = Vec::with_capacity(entries.len());
    let mut group_b = Vec::with_capacity(entries.len());
    let mut radius_a: f64 = 0.0;
    let mut radius_b: f64 = 0.0;

    for (k, mut entry) in entries.into_iter().enumerate() {
        let to_a = k == a || (k != b && matrix.get(a, k) <= matrix.get(b, k));
        let (anchor, group, radius) = if to_a {
            (a, &mut group_a, &mut radius_a)
        } else {
            (b, &mut group_b, &mut radius_b)
        };
        let d = matrix.get(anchor, k);
        *radius = radius.max(d + entry.reach());
        entry.set_distance_to_parent(d);
        group.push(entry);
    }

    debug_assert!(!group_a.is_empty() && group_a.len() <= capacity);
    debug_assert!(!group_b.is_empty() && group_b.len() <= capacity);
    debug!(
        capacity,
        left = group_a.len(),
        right = group_b.len(),
        radius_left = radius_a,
        radius_right = radius_b,
        "split node"
    );

    (
        RoutingEntry::new(router_a, radius_a, E::into_node(group_a)),
        RoutingEntry::new(router_b, radius_b, E::into_node(group_b)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{AbsoluteDifference, CountingDistance};

    fn leaf_entries(values: &[i32]) -> Vec<LeafEntry<i32>> {
        values.iter().map(|&v| LeafEntry::new(v, None)).collect()
    }

    fn leaf_values(entry: &RoutingEntry<i32>) -> Vec<i32> {
        entry
            .child
            .leaf_entries()
            .unwrap()
            .iter()
            .map(|e| e.value)
            .collect()
    }

    #[test]
    fn test_promotes_farthest_pair() {
        let (left, right) = split(leaf_entries(&[5, 0, 100, 3, 97]), 4, &AbsoluteDifference);

        assert_eq!(left.value, 0);
        assert_eq!(right.value, 100);
        assert_eq!(leaf_values(&left), vec![5, 0, 3]);
        assert_eq!(leaf_values(&right), vec![100, 97]);
        assert_eq!(left.covering_radius, 5.0);
        assert_eq!(right.covering_radius, 3.0);
        assert!(left.distance_to_parent.is_none());
    }

    #[test]
    fn test_partition_sets_parent_distances() {
        let (left, right) = split(leaf_entries(&[5, 0, 100, 3, 97]), 4, &AbsoluteDifference);

        for routing in [&left, &right] {
            for entry in routing.child.leaf_entries().unwrap() {
                let expected = (entry.value - routing.value).abs() as f64;
                assert_eq!(entry.distance_to_parent, Some(expected));
            }
        }
    }

    #[test]
    fn test_ties_go_to_first_promoted() {
        // 5 is equidistant from the promoted 0 and 10
        let (left, right) = split(leaf_entries(&[0, 10, 5]), 2, &AbsoluteDifference);
        assert_eq!(leaf_values(&left), vec![0, 5]);
        assert_eq!(leaf_values(&right), vec![10]);
    }

    #[test]
    fn test_pair_tie_uses_input_order() {
        // (0, 2) and (1, 2) are both at distance 4; the first pair wins
        let (left, right) = split(leaf_entries(&[0, 0, 4]), 2, &AbsoluteDifference);
        assert_eq!(leaf_values(&left), vec![0, 0]);
        assert_eq!(leaf_values(&right), vec![4]);
    }

    #[test]
    fn test_duplicates_split_into_non_empty_halves() {
        let (left, right) = split(leaf_entries(&[7, 7, 7]), 2, &AbsoluteDifference);
        assert_eq!(left.child.len() + right.child.len(), 3);
        assert!(!left.child.is_empty());
        assert!(!right.child.is_empty());
    }

    #[test]
    fn test_internal_radius_includes_child_radius() {
        let child = |v: i32, r: f64| RoutingEntry::new(v, r, Node::Leaf(leaf_entries(&[v])));
        let entries = vec![child(0, 2.0), child(3, 4.0), child(50, 1.0)];

        let (left, right) = split(entries, 2, &AbsoluteDifference);

        assert!(left.child.is_internal());
        assert_eq!(left.value, 0);
        // entry 3 sits at distance 3 with its own radius 4
        assert_eq!(left.covering_radius, 7.0);
        assert_eq!(right.value, 50);
        assert_eq!(right.covering_radius, 1.0);
    }

    #[test]
    fn test_distance_calls_are_quadratic_only() {
        let counter = CountingDistance::new(AbsoluteDifference);
        split(leaf_entries(&[1, 2, 3, 4, 5]), 4, &counter);
        assert_eq!(counter.calls(), 10);
    }

    #[test]
    #[should_panic(expected = "capacity + 1")]
    fn test_rejects_wrong_entry_count() {
        split(leaf_entries(&[1, 2]), 4, &AbsoluteDifference);
    }
}
