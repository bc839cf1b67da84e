//! Range and k-NN search with triangle-inequality pruning.
//!
//! Both searches rely on two bounds. For an entry `E` under a routing object
//! `P`, with `dq = d(query, P)` already computed one level up:
//!
//! ```text
//! d(query, v) ≥ |dq - d(E, P)| - r(E)     (no distance call needed)
//! d(query, v) ≥ d(query, E) - r(E)        (one distance call)
//! ```
//!
//! for every value `v` in the subtree of `E`. The first bound uses only
//! cached numbers and is tried first. Leaf values have `r(E) = 0`, and a
//! leaf value is only emitted after its exact distance has been checked.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::distance::Distance;
use crate::node::Node;

/// Lower bound on `d(query, entry)` from cached distances alone. Zero when
/// either side is unknown (entries of the root).
#[inline]
fn parent_bound(query_to_router: Option<f64>, distance_to_parent: Option<f64>) -> f64 {
    match (query_to_router, distance_to_parent) {
        (Some(q), Some(p)) => (q - p).abs(),
        _ => 0.0,
    }
}

/// One node on the range traversal stack.
#[derive(Debug)]
struct Frame<'a, V> {
    node: &'a Node<V>,
    /// `d(query, routing object of node)`; `None` for the root.
    query_to_router: Option<f64>,
    next: usize,
}

/// Lazy iterator over every stored value within `radius` of `query`.
///
/// Created by [`MTree::range`](crate::MTree::range). Values come out in
/// depth-first order. Each iterator owns its traversal stack, so several may
/// run over the same tree at once.
#[derive(Debug)]
pub struct RangeQuery<'a, V, D: ?Sized> {
    distance: &'a D,
    query: &'a V,
    radius: f64,
    stack: Vec<Frame<'a, V>>,
}

impl<'a, V, D> RangeQuery<'a, V, D>
where
    D: Distance<V> + ?Sized,
{
    pub(crate) fn new(root: &'a Node<V>, distance: &'a D, query: &'a V, radius: f64) -> Self {
        Self {
            distance,
            query,
            radius,
            stack: vec![Frame {
                node: root,
                query_to_router: None,
                next: 0,
            }],
        }
    }
}

impl<'a, V, D> Iterator for RangeQuery<'a, V, D>
where
    D: Distance<V> + ?Sized,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        loop {
            let (node, query_to_router, index) = {
                let frame = self.stack.last_mut()?;
                let index = frame.next;
                frame.next += 1;
                (frame.node, frame.query_to_router, index)
            };

            match node {
                Node::Leaf(entries) => {
                    let Some(entry) = entries.get(index) else {
                        self.stack.pop();
                        continue;
                    };
                    if parent_bound(query_to_router, entry.distance_to_parent) > self.radius {
                        continue;
                    }
                    if self.distance.distance(self.query, &entry.value) <= self.radius {
                        return Some(&entry.value);
                    }
                }
                Node::Internal(entries) => {
                    let Some(entry) = entries.get(index) else {
                        self.stack.pop();
                        continue;
                    };
                    let reach = self.radius + entry.covering_radius;
                    if parent_bound(query_to_router, entry.distance_to_parent) > reach {
                        continue;
                    }
                    let d = self.distance.distance(self.query, &entry.value);
                    if d > reach {
                        continue;
                    }
                    self.stack.push(Frame {
                        node: &entry.child,
                        query_to_router: Some(d),
                        next: 0,
                    });
                }
            }
        }
    }
}

/// A k-NN hit with its distance to the query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor<'a, V> {
    pub value: &'a V,
    pub distance: f64,
}

/// Subtree waiting in the k-NN frontier, ordered by (lower bound, arrival).
struct Pending<'a, V> {
    lower_bound: OrderedFloat<f64>,
    seq: usize,
    node: &'a Node<V>,
    query_to_router: Option<f64>,
}

impl<V> PartialEq for Pending<'_, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V> Eq for Pending<'_, V> {}

impl<V> Ord for Pending<'_, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lower_bound
            .cmp(&other.lower_bound)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<V> PartialOrd for Pending<'_, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result candidate, ordered by (distance, arrival) so the heap top is the
/// one to evict: the farthest, and among equals the latest found.
struct Candidate<'a, V> {
    distance: OrderedFloat<f64>,
    seq: usize,
    value: &'a V,
}

impl<V> PartialEq for Candidate<'_, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V> Eq for Candidate<'_, V> {}

impl<V> Ord for Candidate<'_, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<V> PartialOrd for Candidate<'_, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded max-heap of the best `k` candidates seen so far.
struct KnnResults<'a, V> {
    k: usize,
    heap: BinaryHeap<Candidate<'a, V>>,
}

impl<'a, V> KnnResults<'a, V> {
    /// `k` may exceed the number of stored values (up to `usize::MAX`);
    /// the heap grows with the candidates actually offered.
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::new(),
        }
    }

    /// Current k-th best distance; infinite until `k` candidates are held.
    fn limit(&self) -> f64 {
        if self.heap.len() < self.k {
            return f64::INFINITY;
        }
        self.heap.peek().map_or(f64::INFINITY, |c| c.distance.0)
    }

    /// Offer a candidate. Only strictly closer values displace a full set,
    /// which keeps the earliest found among equal distances.
    fn offer(&mut self, distance: f64, seq: usize, value: &'a V) {
        if self.heap.len() >= self.k && distance >= self.limit() {
            return;
        }
        self.heap.push(Candidate {
            distance: OrderedFloat(distance),
            seq,
            value,
        });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    fn into_sorted(self) -> Vec<Neighbor<'a, V>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                value: c.value,
                distance: c.distance.0,
            })
            .collect()
    }
}

/// Best-first k-NN search.
///
/// Subtrees are expanded in order of their lower bound `max(0, d(q, E) - r(E))`.
/// The search stops as soon as the closest pending subtree cannot beat the
/// current k-th best distance.
pub(crate) fn knn<'a, V, D>(
    root: &'a Node<V>,
    distance: &D,
    query: &V,
    k: usize,
) -> Vec<Neighbor<'a, V>>
where
    D: Distance<V> + ?Sized,
{
    if k == 0 || root.is_empty() {
        return Vec::new();
    }

    let mut results = KnnResults::new(k);
    let mut frontier: BinaryHeap<Reverse<Pending<'a, V>>> = BinaryHeap::new();
    let mut seq = 0usize;
    frontier.push(Reverse(Pending {
        lower_bound: OrderedFloat(0.0),
        seq,
        node: root,
        query_to_router: None,
    }));

    while let Some(Reverse(pending)) = frontier.pop() {
        if pending.lower_bound.0 > results.limit() {
            break;
        }

        match pending.node {
            Node::Leaf(entries) => {
                for entry in entries {
                    if parent_bound(pending.query_to_router, entry.distance_to_parent)
                        > results.limit()
                    {
                        continue;
                    }
                    let d = distance.distance(query, &entry.value);
                    seq += 1;
                    results.offer(d, seq, &entry.value);
                }
            }
            Node::Internal(entries) => {
                for entry in entries {
                    let limit = results.limit();
                    let bound = parent_bound(pending.query_to_router, entry.distance_to_parent);
                    if bound - entry.covering_radius > limit {
                        continue;
                    }
                    let d = distance.distance(query, &entry.value);
                    let lower_bound = (d - entry.covering_radius).max(0.0);
                    if lower_bound > limit {
                        continue;
                    }
                    seq += 1;
                    frontier.push(Reverse(Pending {
                        lower_bound: OrderedFloat(lower_bound),
                        seq,
                        node: &entry.child,
                        query_to_router: Some(d),
                    }));
                }
            }
        }
    }

    results.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{AbsoluteDifference, CountingDistance};
    use crate::node::{LeafEntry, RoutingEntry};

    /// Two leaves under routers 0 and 100, each covering radius 10.
    fn two_cluster_tree() -> Node<i32> {
        let leaf = |router: i32, values: &[i32]| {
            Node::Leaf(
                values
                    .iter()
                    .map(|&v| LeafEntry::new(v, Some((v - router).abs() as f64)))
                    .collect(),
            )
        };
        Node::Internal(vec![
            RoutingEntry::new(0, 10.0, leaf(0, &[0, 5, 10, -10])),
            RoutingEntry::new(100, 10.0, leaf(100, &[100, 95, 110])),
        ])
    }

    #[test]
    fn test_parent_bound() {
        assert_eq!(parent_bound(Some(10.0), Some(4.0)), 6.0);
        assert_eq!(parent_bound(Some(4.0), Some(10.0)), 6.0);
        assert_eq!(parent_bound(None, Some(4.0)), 0.0);
        assert_eq!(parent_bound(Some(4.0), None), 0.0);
    }

    #[test]
    fn test_range_prunes_far_cluster() {
        let root = two_cluster_tree();
        let counter = CountingDistance::new(AbsoluteDifference);

        let mut hits: Vec<i32> = RangeQuery::new(&root, &counter, &3, 3.0).copied().collect();
        hits.sort();

        assert_eq!(hits, vec![0, 5]);
        // two routers plus the cluster around 0; 10 and -10 are cut by the
        // cached parent distance without a call
        assert_eq!(counter.calls(), 4);
    }

    #[test]
    fn test_range_on_empty_leaf() {
        let root: Node<i32> = Node::default();
        assert_eq!(RangeQuery::new(&root, &AbsoluteDifference, &1, 100.0).count(), 0);
    }

    #[test]
    fn test_knn_orders_by_distance() {
        let root = two_cluster_tree();
        let hits = knn(&root, &AbsoluteDifference, &97, 3);

        let values: Vec<i32> = hits.iter().map(|n| *n.value).collect();
        assert_eq!(values, vec![95, 100, 110]);
        assert_eq!(hits[0].distance, 2.0);
    }

    #[test]
    fn test_knn_skips_unreachable_cluster() {
        let root = two_cluster_tree();
        let counter = CountingDistance::new(AbsoluteDifference);

        let hits = knn(&root, &counter, &1, 2);

        let values: Vec<i32> = hits.iter().map(|n| *n.value).collect();
        assert_eq!(values, vec![0, 5]);
        // routers 0 and 100, then 0 and 5; once the set is full 10 and -10
        // fall to the parent bound and the 100 cluster is never opened
        assert_eq!(counter.calls(), 4);
    }

    #[test]
    fn test_knn_zero_and_oversized_k() {
        let root = two_cluster_tree();
        assert!(knn(&root, &AbsoluteDifference, &1, 0).is_empty());
        assert_eq!(knn(&root, &AbsoluteDifference, &1, 100).len(), 7);
    }

    #[test]
    fn test_knn_huge_k_returns_everything() {
        let root = two_cluster_tree();
        for k in [usize::MAX, 1 << 60] {
            let values: Vec<i32> = knn(&root, &AbsoluteDifference, &1, k)
                .iter()
                .map(|n| *n.value)
                .collect();
            assert_eq!(values, vec![0, 5, 10, -10, 95, 100, 110]);
        }
    }

    #[test]
    fn test_knn_ties_keep_first_found() {
        let root = Node::Leaf(vec![
            LeafEntry::new(4, None),
            LeafEntry::new(6, None),
            LeafEntry::new(5, None),
        ]);
        let values: Vec<i32> = knn(&root, &AbsoluteDifference, &5, 2)
            .iter()
            .map(|n| *n.value)
            .collect();
        assert_eq!(values, vec![5, 4]);
    }
}
