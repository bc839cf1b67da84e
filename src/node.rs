//! M-tree node structure
//!
//! A node is either a leaf holding stored values or an internal node holding
//! routing entries. Each routing entry owns its child node outright, so the
//! tree is a plain ownership hierarchy with no parent pointers and no
//! sharing.
//!
//! ## Cached distances
//!
//! Every non-root entry caches its distance to the routing object of the
//! node that contains it (`distance_to_parent`). Queries combine this with
//! the already known query-to-parent distance to reject entries through the
//! triangle inequality without calling the distance function.

/// A stored value inside a leaf.
#[derive(Clone, Debug)]
pub struct LeafEntry<V> {
    pub value: V,

    /// `d(value, parent routing object)`; `None` when this leaf is the root.
    pub distance_to_parent: Option<f64>,
}

/// Entry for a child node in an internal node
#[derive(Clone, Debug)]
pub struct RoutingEntry<V> {
    /// Routing object anchoring the child subtree.
    pub value: V,

    /// `d(value, parent routing object)`; `None` for entries of the root.
    pub distance_to_parent: Option<f64>,

    /// Upper bound on `d(value, v)` for every `v` stored below `child`.
    pub covering_radius: f64,

    pub child: Box<Node<V>>,
}

/// Node content - either routing entries (internal) or values (leaf)
#[derive(Clone, Debug)]
pub enum Node<V> {
    Leaf(Vec<LeafEntry<V>>),
    Internal(Vec<RoutingEntry<V>>),
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Node::Leaf(Vec::new())
    }
}

impl<V> LeafEntry<V> {
    pub fn new(value: V, distance_to_parent: Option<f64>) -> Self {
        Self {
            value,
            distance_to_parent,
        }
    }
}

impl<V> RoutingEntry<V> {
    pub fn new(value: V, covering_radius: f64, child: Node<V>) -> Self {
        Self {
            value,
            distance_to_parent: None,
            covering_radius,
            child: Box::new(child),
        }
    }
}

impl<V> Node<V> {
    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Check if this is an internal node
    pub fn is_internal(&self) -> bool {
        matches!(self, Node::Internal(_))
    }

    /// Number of entries (values for a leaf, children for an internal node)
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A node holding more than `capacity` entries must be split.
    pub fn is_overflowing(&self, capacity: usize) -> bool {
        self.len() > capacity
    }

    /// Get leaf entries (for leaf nodes)
    pub fn leaf_entries(&self) -> Option<&[LeafEntry<V>]> {
        match self {
            Node::Leaf(entries) => Some(entries),
            Node::Internal(_) => None,
        }
    }

    /// Get routing entries (for internal nodes)
    pub fn routing_entries(&self) -> Option<&[RoutingEntry<V>]> {
        match self {
            Node::Internal(entries) => Some(entries),
            Node::Leaf(_) => None,
        }
    }

    /// Depth-first iterator over every value stored in this subtree.
    pub fn values(&self) -> Values<'_, V> {
        Values {
            stack: vec![self],
            current: Default::default(),
        }
    }

    /// Levels from this node down to its leaves; a lone leaf has height 1.
    /// All leaves sit at the same depth, so following the first child suffices.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self;
        while let Node::Internal(entries) = node {
            match entries.first() {
                Some(entry) => {
                    node = &entry.child;
                    height += 1;
                }
                None => break,
            }
        }
        height
    }

    /// Count (leaf nodes, internal nodes) in this subtree.
    pub fn node_counts(&self) -> (usize, usize) {
        let mut leaves = 0;
        let mut internals = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(_) => leaves += 1,
                Node::Internal(entries) => {
                    internals += 1;
                    stack.extend(entries.iter().map(|e| e.child.as_ref()));
                }
            }
        }
        (leaves, internals)
    }
}

/// Iterator returned by [`Node::values`].
#[derive(Debug)]
pub struct Values<'a, V> {
    stack: Vec<&'a Node<V>>,
    current: std::slice::Iter<'a, LeafEntry<V>>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(&entry.value);
            }
            match self.stack.pop()? {
                Node::Leaf(entries) => self.current = entries.iter(),
                // Reversed so children come out in entry order
                Node::Internal(entries) => {
                    self.stack.extend(entries.iter().rev().map(|e| e.child.as_ref()))
                }
            }
        }
    }
}
