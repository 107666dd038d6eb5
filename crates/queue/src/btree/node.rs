/// Index of a node in the tree's arena.
pub(crate) type NodeId = usize;

/// A slot in the node arena.
#[derive(Debug)]
pub(crate) enum Node<T> {
    /// Sorted run of values.
    Leaf(Vec<T>),
    Internal(Internal<T>),
    /// Freed slot, waiting on the free list for reuse.
    Vacant,
}

/// Routing node: `children.len() == keys.len() + 1`.
///
/// `keys[i]` bounds the values of `children[..=i]` from above and the
/// values of `children[i + 1..]` from below. Equal values may sit on both
/// sides of a separator.
#[derive(Debug)]
pub(crate) struct Internal<T> {
    pub keys: Vec<T>,
    pub children: Vec<NodeId>,
    /// Number of values stored below this node.
    pub size: usize,
}

impl<T> Node<T> {
    /// Values (leaf) or children (internal) held directly by this node.
    pub fn entries(&self) -> usize {
        match self {
            Node::Leaf(values) => values.len(),
            Node::Internal(node) => node.children.len(),
            Node::Vacant => 0,
        }
    }

    /// Values stored in the subtree rooted at this node.
    pub fn size(&self) -> usize {
        match self {
            Node::Leaf(values) => values.len(),
            Node::Internal(node) => node.size,
            Node::Vacant => 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}
