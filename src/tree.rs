//! M-tree: the main data structure.
//!
//! ## Algorithm Overview
//!
//! ### Insert
//! 1. Start at root
//! 2. At each internal node, follow the entry whose covering radius already
//!    contains the value (closest router first); if none does, follow the
//!    one needing the smallest radius increase and grow it
//! 3. Append the value to the leaf reached
//! 4. Split if full, propagate splits up
//! 5. If the root splits, a new root holds the two promoted entries
//!
//! ### Query
//! Range and k-NN search descend from the root and prune subtrees with the
//! triangle inequality (see [`crate::query`]).
//!
//! ## Complexity
//! - Insert: O(M · height) distance calls, plus O(M²) per split
//! - Query: depends on the data's intrinsic dimension; worst case linear

use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{MTreeConfig, DEFAULT_NODE_CAPACITY};
use crate::distance::Distance;
use crate::error::{MTreeError, Result};
use crate::node::{LeafEntry, Node, RoutingEntry, Values};
use crate::query::{Neighbor, RangeQuery};
use crate::split;

/// Relative slack allowed when re-deriving cached distances in
/// [`MTree::verify_integrity`].
const VERIFY_TOLERANCE: f64 = 1e-9;

/// The M-tree
///
/// Owns the root node, the distance function and the node capacity. Values
/// are only ever added; there is no removal.
pub struct MTree<V, D> {
    root: Node<V>,
    distance: D,
    capacity: usize,
    size: usize,
}

/// Structure summary returned by [`MTree::stats`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub size: usize,
    pub height: usize,
    pub node_capacity: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
}

impl<V, D> MTree<V, D>
where
    D: Distance<V>,
{
    /// Create an empty tree. Fails if `capacity < 2`.
    pub fn new(distance: D, capacity: usize) -> Result<Self> {
        Self::with_config(distance, &MTreeConfig::with_capacity(capacity))
    }

    pub fn with_config(distance: D, config: &MTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: Node::default(),
            distance,
            capacity: config.node_capacity,
            size: 0,
        })
    }

    /// Empty tree with the default node capacity.
    pub fn with_distance(distance: D) -> Self {
        Self {
            root: Node::default(),
            distance,
            capacity: DEFAULT_NODE_CAPACITY,
            size: 0,
        }
    }

    /// Number of stored values, duplicates included.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum entries per node.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn height(&self) -> usize {
        self.root.height()
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Every stored value, depth-first.
    pub fn iter(&self) -> Values<'_, V> {
        self.root.values()
    }

    /// Get tree statistics
    pub fn stats(&self) -> TreeStats {
        let (leaf_nodes, internal_nodes) = self.root.node_counts();
        TreeStats {
            size: self.size,
            height: self.height(),
            node_capacity: self.capacity,
            leaf_nodes,
            internal_nodes,
        }
    }

    /// All stored values within `radius` of `query` (inclusive), lazily and
    /// in no particular order.
    ///
    /// A negative or NaN radius yields nothing; use [`MTree::try_range`] to
    /// have it rejected instead.
    pub fn range<'a>(&'a self, query: &'a V, radius: f64) -> RangeQuery<'a, V, D> {
        RangeQuery::new(&self.root, &self.distance, query, radius)
    }

    /// Like [`MTree::range`] but rejects a negative or NaN radius.
    pub fn try_range<'a>(&'a self, query: &'a V, radius: f64) -> Result<RangeQuery<'a, V, D>> {
        if radius.is_nan() || radius < 0.0 {
            return Err(MTreeError::InvalidRadius { radius });
        }
        Ok(self.range(query, radius))
    }

    /// Whether a value equal to `value` has been inserted.
    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.range(value, 0.0).any(|v| v == value)
    }

    /// Up to `k` stored values, closest first. Equal distances keep the
    /// order in which the search met them.
    pub fn knn(&self, query: &V, k: usize) -> Vec<&V> {
        self.knn_with_distances(query, k)
            .into_iter()
            .map(|n| n.value)
            .collect()
    }

    /// [`MTree::knn`] with each hit's distance to the query.
    pub fn knn_with_distances(&self, query: &V, k: usize) -> Vec<Neighbor<'_, V>> {
        crate::query::knn(&self.root, &self.distance, query, k)
    }

    /// The single closest stored value, if any.
    pub fn nearest(&self, query: &V) -> Option<&V> {
        self.knn(query, 1).into_iter().next()
    }

    /// Run independent k-NN queries in parallel using rayon.
    pub fn knn_batch(&self, queries: &[V], k: usize) -> Vec<Vec<&V>>
    where
        V: Sync,
        D: Sync,
    {
        queries.par_iter().map(|q| self.knn(q, k)).collect()
    }

    /// Walk the whole tree and check its structural invariants:
    /// node capacity, balanced leaf depth, cached parent distances,
    /// covering radii and the value count.
    pub fn verify_integrity(&self) -> Result<()> {
        let mut checker = Checker {
            distance: &self.distance,
            capacity: self.capacity,
            leaf_depth: None,
        };
        let count = checker.check(&self.root, None, 1)?;
        if count != self.size {
            return Err(MTreeError::InvariantViolation(format!(
                "tree holds {} values but size is {}",
                count, self.size
            )));
        }
        Ok(())
    }
}

impl<V, D> MTree<V, D>
where
    V: Clone,
    D: Distance<V>,
{
    /// Build a tree from `values`, inserted in order.
    pub fn from_values<I>(distance: D, capacity: usize, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
    {
        let mut tree = Self::new(distance, capacity)?;
        tree.extend(values);
        Ok(tree)
    }

    /// Insert a value. Duplicates are stored as separate entries.
    pub fn insert(&mut self, value: V) {
        if let Some((left, right)) =
            insert_into(&mut self.root, value, None, &self.distance, self.capacity)
        {
            self.root = Node::Internal(vec![left, right]);
            debug!(
                height = self.root.height(),
                size = self.size + 1,
                "root split, tree grew"
            );
        }
        self.size += 1;
    }
}

impl<V, D> Extend<V> for MTree<V, D>
where
    V: Clone,
    D: Distance<V>,
{
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<V: fmt::Debug, D> fmt::Debug for MTree<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MTree")
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("root", &self.root)
            .finish()
    }
}

/// Pick the child to descend into for `value`.
///
/// Returns the entry index and `d(router, value)`. Entries already covering
/// the value win (closest first); otherwise the smallest radius increase.
/// The first entry wins any tie.
fn choose_subtree<V, D>(
    entries: &[RoutingEntry<V>],
    value: &V,
    distance: &D,
) -> Option<(usize, f64)>
where
    D: Distance<V>,
{
    let mut covering: Option<(usize, f64)> = None;
    let mut growing: Option<(usize, f64, f64)> = None;

    for (index, entry) in entries.iter().enumerate() {
        let d = distance.distance(&entry.value, value);
        if d <= entry.covering_radius {
            if covering.map_or(true, |(_, best)| d < best) {
                covering = Some((index, d));
            }
        } else {
            let increase = d - entry.covering_radius;
            if growing.map_or(true, |(_, _, best)| increase < best) {
                growing = Some((index, d, increase));
            }
        }
    }

    covering.or(growing.map(|(index, d, _)| (index, d)))
}

/// Recursive insert below `node`.
///
/// `parent` is the routing object of `node` together with its distance to
/// `value`, or `None` at the root. Returns the two replacement routing
/// entries if `node` overflowed and was split; `node` is left empty then.
fn insert_into<V, D>(
    node: &mut Node<V>,
    value: V,
    parent: Option<(&V, f64)>,
    distance: &D,
    capacity: usize,
) -> Option<(RoutingEntry<V>, RoutingEntry<V>)>
where
    V: Clone,
    D: Distance<V>,
{
    let overflowing = match node {
        Node::Leaf(entries) => {
            entries.push(LeafEntry::new(value, parent.map(|(_, d)| d)));
            entries.len() > capacity
        }
        Node::Internal(entries) => {
            let Some((index, d)) = choose_subtree(entries, &value, distance) else {
                unreachable!("internal node without entries");
            };

            let RoutingEntry {
                value: router,
                covering_radius,
                child,
                ..
            } = &mut entries[index];
            if d > *covering_radius {
                trace!(index, from = *covering_radius, to = d, "growing covering radius");
                *covering_radius = d;
            }

            match insert_into(child, value, Some((&*router, d)), distance, capacity) {
                Some((mut left, mut right)) => {
                    if let Some((parent_router, _)) = parent {
                        left.distance_to_parent =
                            Some(distance.distance(&left.value, parent_router));
                        right.distance_to_parent =
                            Some(distance.distance(&right.value, parent_router));
                    }
                    entries[index] = left;
                    entries.insert(index + 1, right);
                    entries.len() > capacity
                }
                None => false,
            }
        }
    };

    if !overflowing {
        return None;
    }

    let promoted = match std::mem::take(node) {
        Node::Leaf(entries) => split::split(entries, capacity, distance),
        Node::Internal(entries) => split::split(entries, capacity, distance),
    };
    Some(promoted)
}

/// Recursive structural check used by [`MTree::verify_integrity`].
struct Checker<'a, D> {
    distance: &'a D,
    capacity: usize,
    leaf_depth: Option<usize>,
}

impl<D> Checker<'_, D> {
    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= VERIFY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
    }

    fn violation(message: String) -> Result<usize> {
        Err(MTreeError::InvariantViolation(message))
    }

    fn check_parent_distance<V>(
        &self,
        value: &V,
        cached: Option<f64>,
        router: Option<&V>,
        depth: usize,
    ) -> Result<()>
    where
        D: Distance<V>,
    {
        match (router, cached) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(MTreeError::InvariantViolation(format!(
                "root entry at depth {depth} carries a parent distance"
            ))),
            (Some(_), None) => Err(MTreeError::InvariantViolation(format!(
                "entry at depth {depth} is missing its parent distance"
            ))),
            (Some(router), Some(cached)) => {
                let actual = self.distance.distance(value, router);
                if Self::close(actual, cached) {
                    Ok(())
                } else {
                    Err(MTreeError::InvariantViolation(format!(
                        "entry at depth {depth} caches parent distance {cached}, actual {actual}"
                    )))
                }
            }
        }
    }

    /// Returns the number of values stored under `node`.
    fn check<V>(&mut self, node: &Node<V>, router: Option<&V>, depth: usize) -> Result<usize>
    where
        D: Distance<V>,
    {
        if node.len() > self.capacity {
            return Self::violation(format!(
                "node at depth {depth} holds {} entries, capacity is {}",
                node.len(),
                self.capacity
            ));
        }
        if node.is_empty() && router.is_some() {
            return Self::violation(format!("empty non-root node at depth {depth}"));
        }

        match node {
            Node::Leaf(entries) => {
                match self.leaf_depth {
                    None => self.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Self::violation(format!(
                            "leaf at depth {depth}, other leaves at depth {expected}"
                        ));
                    }
                    Some(_) => {}
                }
                for entry in entries {
                    self.check_parent_distance(
                        &entry.value,
                        entry.distance_to_parent,
                        router,
                        depth,
                    )?;
                }
                Ok(entries.len())
            }
            Node::Internal(entries) => {
                let mut count = 0;
                for entry in entries {
                    self.check_parent_distance(
                        &entry.value,
                        entry.distance_to_parent,
                        router,
                        depth,
                    )?;
                    for v in entry.child.values() {
                        let d = self.distance.distance(&entry.value, v);
                        if d > entry.covering_radius && !Self::close(d, entry.covering_radius) {
                            return Self::violation(format!(
                                "value at distance {d} outside covering radius {} at depth {depth}",
                                entry.covering_radius
                            ));
                        }
                    }
                    count += self.check(&entry.child, Some(&entry.value), depth + 1)?;
                }
                Ok(count)
            }
        }
    }
}
