//! B+tree priority queue with rank queries.
//!
//! Values live in leaves in comparator order; internal nodes hold separator
//! copies and cache the number of values below them, so rank lookups touch
//! one node per level. Removal only happens at the front, so rebalancing
//! always pairs the leftmost child with its right sibling.
//!
//! ```text
//!                 [Internal: keys [20, 40], size 8]
//!                /               |                \
//!     [Leaf 3, 9, 20]     [Leaf 20, 31]     [Leaf 40, 44, 50]
//! ```
//!
//! Equal values are kept in insertion order: a new value is routed past
//! every separator that compares equal and lands after its equals in the
//! leaf.

mod invariants;
mod iter;
mod node;
#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

pub use iter::Iter;
use node::{Internal, Node, NodeId};

use crate::serial::SerialQueue;

/// Default branching factor: max values per leaf and children per node.
pub const DEFAULT_ORDER: usize = 64;

/// Smallest branching factor that keeps ⌈K/2⌉ occupancy after merges.
pub const MIN_ORDER: usize = 4;

/// Comparator used by [`BTreeQueue::new`].
pub type NaturalOrder<T> = fn(&T, &T) -> Ordering;

/// Ordered multiset that pops its minimum and answers rank queries.
///
/// Single-threaded; wrap it in a [`BlockingQueue`](crate::BlockingQueue)
/// to share it between producers and consumers.
pub struct BTreeQueue<T, C = NaturalOrder<T>> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
    root: NodeId,
    /// Leftmost leaf. Splits keep the left half in place and merges absorb
    /// the right sibling into the left, so this slot never changes.
    head: NodeId,
    order: usize,
    cmp: C,
}

impl<T: Ord> BTreeQueue<T> {
    pub fn new() -> Self {
        Self::with_comparator(<T as Ord>::cmp)
    }

    pub fn with_order(order: usize) -> Self {
        Self::with_order_and_comparator(order, <T as Ord>::cmp)
    }
}

impl<T: Ord> Default for BTreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> BTreeQueue<T, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::with_order_and_comparator(DEFAULT_ORDER, cmp)
    }

    /// # Panics
    ///
    /// Panics if `order` is below [`MIN_ORDER`].
    pub fn with_order_and_comparator(order: usize, cmp: C) -> Self {
        assert!(
            order >= MIN_ORDER,
            "btree order must be at least {MIN_ORDER}, got {order}"
        );
        Self {
            nodes: vec![Node::Leaf(Vec::new())],
            free: Vec::new(),
            root: 0,
            head: 0,
            order,
            cmp,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of stored values. O(1): the root caches it.
    pub fn len(&self) -> usize {
        self.nodes[self.root].size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The minimum value, without removing it. O(1).
    pub fn peek(&self) -> Option<&T> {
        match &self.nodes[self.head] {
            Node::Leaf(values) => values.first(),
            _ => None,
        }
    }

    /// Levels from root to leaves; a lone leaf has height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id] {
            height += 1;
            id = node.children[0];
        }
        height
    }

    /// Value at `rank` in sorted order.
    pub fn get(&self, mut rank: usize) -> Option<&T> {
        if rank >= self.len() {
            return None;
        }
        let mut id = self.root;
        loop {
            match &self.nodes[id] {
                Node::Leaf(values) => return values.get(rank),
                Node::Internal(node) => {
                    let mut next = None;
                    for &child in &node.children {
                        let size = self.nodes[child].size();
                        if rank < size {
                            next = Some(child);
                            break;
                        }
                        rank -= size;
                    }
                    id = next?;
                }
                Node::Vacant => return None,
            }
        }
    }

    /// In-order iterator over the stored values.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.nodes, self.root, self.len())
    }

    /// Leaves currently allocated times the per-leaf capacity.
    pub fn internal_capacity(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count() * self.order
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::Leaf(Vec::new()));
        self.free.clear();
        self.root = 0;
        self.head = 0;
    }

    fn min_entries(&self) -> usize {
        self.order.div_ceil(2)
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = Node::Vacant;
        self.free.push(id);
    }

    /// Move a node out of its slot, leaving it vacant until put back.
    fn take(&mut self, id: NodeId) -> Node<T> {
        std::mem::replace(&mut self.nodes[id], Node::Vacant)
    }

    fn internal(&self, id: NodeId) -> &Internal<T> {
        match &self.nodes[id] {
            Node::Internal(node) => node,
            _ => unreachable!("node {id} is not internal"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut Internal<T> {
        match &mut self.nodes[id] {
            Node::Internal(node) => node,
            _ => unreachable!("node {id} is not internal"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut Vec<T> {
        match &mut self.nodes[id] {
            Node::Leaf(values) => values,
            _ => unreachable!("node {id} is not a leaf"),
        }
    }

    /// Replace a root that has a single child with that child.
    fn collapse_root(&mut self) {
        while let Node::Internal(node) = &self.nodes[self.root] {
            if node.children.len() > 1 {
                break;
            }
            let old = self.root;
            self.root = node.children[0];
            self.release(old);
            trace!(root = self.root, height = self.height(), "btree queue root collapsed");
        }
    }
}

impl<T, C> BTreeQueue<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Number of stored values strictly less than `value`; the rank a new
    /// equal value's first occurrence would take.
    pub fn index_before(&self, value: &T) -> usize {
        let cmp = &self.cmp;
        let mut rank = 0;
        let mut id = self.root;
        loop {
            match &self.nodes[id] {
                Node::Leaf(values) => {
                    return rank + values.partition_point(|v| cmp(v, value).is_lt());
                }
                Node::Internal(node) => {
                    // Children left of the first separator >= value hold only
                    // values below it.
                    let idx = node.keys.partition_point(|k| cmp(k, value).is_lt());
                    rank += node.children[..idx]
                        .iter()
                        .map(|&c| self.nodes[c].size())
                        .sum::<usize>();
                    id = node.children[idx];
                }
                Node::Vacant => return rank,
            }
        }
    }

    /// Rank of the first stored value equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        let rank = self.index_before(value);
        self.get(rank)
            .filter(|found| (self.cmp)(*found, value).is_eq())
            .map(|_| rank)
    }
}

impl<T, C> BTreeQueue<T, C>
where
    T: Clone,
    C: Fn(&T, &T) -> Ordering,
{
    /// Insert `value` after every stored value that compares equal to it.
    pub fn add(&mut self, value: T) {
        if let Some((separator, right)) = self.insert_into(self.root, value) {
            let left = self.root;
            let size = self.nodes[left].size() + self.nodes[right].size();
            self.root = self.alloc(Node::Internal(Internal {
                keys: vec![separator],
                children: vec![left, right],
                size,
            }));
            trace!(root = self.root, height = self.height(), "btree queue root split");
        }
    }

    /// Insert `value` and return the rank of the first value equal to it,
    /// which is the inserted value's own rank unless it has equals.
    pub fn add_index_of(&mut self, value: T) -> usize {
        let rank = self.index_before(&value);
        self.add(value);
        rank
    }

    /// Remove and return the minimum value.
    pub fn poll(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let mut path = Vec::new();
        let mut id = self.root;
        while let Node::Internal(node) = &mut self.nodes[id] {
            node.size -= 1;
            path.push(id);
            id = node.children[0];
        }
        debug_assert_eq!(id, self.head);
        let value = self.leaf_mut(id).remove(0);

        let min = self.min_entries();
        for &parent in path.iter().rev() {
            let first = self.internal(parent).children[0];
            if self.nodes[first].entries() >= min {
                break;
            }
            self.rebalance_front(parent);
        }
        self.collapse_root();

        Some(value)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Descend to the leaf `value` belongs in, returning the separator and
    /// new right sibling if `id` had to split.
    fn insert_into(&mut self, id: NodeId, value: T) -> Option<(T, NodeId)> {
        let order = self.order;
        let cmp = &self.cmp;
        let (idx, child) = match &mut self.nodes[id] {
            Node::Leaf(values) => {
                let pos = values.partition_point(|v| cmp(v, &value).is_le());
                values.insert(pos, value);
                if values.len() <= order {
                    return None;
                }
                return Some(self.split_leaf(id));
            }
            Node::Internal(node) => {
                let idx = node.keys.partition_point(|k| cmp(k, &value).is_le());
                node.size += 1;
                (idx, node.children[idx])
            }
            Node::Vacant => unreachable!("descended into vacant node {id}"),
        };

        let (separator, right) = self.insert_into(child, value)?;
        let node = self.internal_mut(id);
        node.keys.insert(idx, separator);
        node.children.insert(idx + 1, right);
        if node.children.len() <= order {
            return None;
        }
        Some(self.split_internal(id))
    }

    /// Move the upper half of an overfull leaf into a new right sibling.
    fn split_leaf(&mut self, id: NodeId) -> (T, NodeId) {
        let values = self.leaf_mut(id);
        let mid = values.len() / 2;
        let right = values.split_off(mid);
        let separator = right[0].clone();
        (separator, self.alloc(Node::Leaf(right)))
    }

    /// Move the upper half of an overfull internal node into a new right
    /// sibling; the middle separator moves up to the parent.
    fn split_internal(&mut self, id: NodeId) -> (T, NodeId) {
        let (separator, keys, children) = {
            let node = self.internal_mut(id);
            let mid = node.children.len() / 2;
            let children = node.children.split_off(mid);
            let mut keys = node.keys.split_off(mid - 1);
            let separator = keys.remove(0);
            (separator, keys, children)
        };
        let size = children.iter().map(|&c| self.nodes[c].size()).sum::<usize>();
        self.internal_mut(id).size -= size;
        let right = self.alloc(Node::Internal(Internal {
            keys,
            children,
            size,
        }));
        (separator, right)
    }

    /// Restore occupancy of `parent`'s first child by borrowing from, or
    /// merging with, its right sibling.
    fn rebalance_front(&mut self, parent: NodeId) {
        let min = self.min_entries();
        let (left_id, right_id) = {
            let node = self.internal(parent);
            (node.children[0], node.children[1])
        };
        let mut left = self.take(left_id);
        let mut right = self.take(right_id);

        let merged = match (&mut left, &mut right) {
            (Node::Leaf(lv), Node::Leaf(rv)) => {
                if rv.len() > min {
                    lv.push(rv.remove(0));
                    self.internal_mut(parent).keys[0] = rv[0].clone();
                    false
                } else {
                    lv.append(rv);
                    let node = self.internal_mut(parent);
                    node.keys.remove(0);
                    node.children.remove(1);
                    true
                }
            }
            (Node::Internal(l), Node::Internal(r)) => {
                if r.children.len() > min {
                    let child = r.children.remove(0);
                    let key = r.keys.remove(0);
                    let moved = self.nodes[child].size();
                    let separator = std::mem::replace(&mut self.internal_mut(parent).keys[0], key);
                    l.keys.push(separator);
                    l.children.push(child);
                    l.size += moved;
                    r.size -= moved;
                    false
                } else {
                    let node = self.internal_mut(parent);
                    let separator = node.keys.remove(0);
                    node.children.remove(1);
                    l.keys.push(separator);
                    l.keys.append(&mut r.keys);
                    l.children.append(&mut r.children);
                    l.size += r.size;
                    true
                }
            }
            _ => unreachable!("siblings {left_id} and {right_id} differ in kind"),
        };

        self.nodes[left_id] = left;
        if merged {
            self.free.push(right_id);
        } else {
            self.nodes[right_id] = right;
        }
    }
}

impl<T, C> SerialQueue<T> for BTreeQueue<T, C>
where
    T: Clone,
    C: Fn(&T, &T) -> Ordering,
{
    fn add(&mut self, value: T) -> bool {
        BTreeQueue::add(self, value);
        true
    }

    fn poll(&mut self) -> Option<T> {
        BTreeQueue::poll(self)
    }

    fn peek(&self) -> Option<&T> {
        BTreeQueue::peek(self)
    }

    fn len(&self) -> usize {
        BTreeQueue::len(self)
    }

    fn to_vec(&self) -> Vec<T> {
        BTreeQueue::to_vec(self)
    }

    fn clear(&mut self) {
        BTreeQueue::clear(self)
    }

    fn internal_capacity(&self) -> usize {
        BTreeQueue::internal_capacity(self)
    }
}

impl<T, C> fmt::Debug for BTreeQueue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTreeQueue")
            .field("len", &self.len())
            .field("height", &self.height())
            .field("order", &self.order)
            .finish()
    }
}
