//! # M-Tree
//!
//! A balanced index over an arbitrary metric space answering range and
//! k-nearest-neighbor queries. The only thing the tree knows about its
//! values is a caller-supplied distance function, which is assumed to be the
//! expensive part (an API call, an edit distance over long strings). Every
//! design choice aims at calling it as rarely as possible.
//!
//! ## Key Properties
//! - Works for any metric: numbers, points, strings, or custom closures
//! - Covering radii plus cached parent distances prune whole subtrees via
//!   the triangle inequality, often without a single distance call
//! - Insert-only, height grows at the root like a B-tree
//! - Plain owned node hierarchy: no parent pointers, no interior mutability
//!
//! ## Example
//!
//! ```
//! use m_tree::{AbsoluteDifference, MTree};
//!
//! let mut tree = MTree::new(AbsoluteDifference, 4).unwrap();
//! for v in [5i64, 10, 15] {
//!     tree.insert(v);
//! }
//!
//! assert!(tree.contains(&10));
//! assert!(!tree.contains(&6));
//! assert_eq!(tree.knn(&8, 2), vec![&10, &5]);
//!
//! let mut near: Vec<i64> = tree.range(&12, 3.0).copied().collect();
//! near.sort();
//! assert_eq!(near, vec![10, 15]);
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod node;
pub mod query;
mod split;
pub mod tree;

pub use config::{MTreeConfig, DEFAULT_NODE_CAPACITY};
pub use distance::{
    AbsoluteDifference, CachedDistance, CountingDistance, Discrete, Distance, Levenshtein,
    Manhattan,
};
pub use error::{MTreeError, Result};
pub use node::{LeafEntry, Node, RoutingEntry};
pub use query::{Neighbor, RangeQuery};
pub use tree::{MTree, TreeStats};
