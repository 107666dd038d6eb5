use std::cmp::Ordering;
use std::collections::HashSet;

use super::node::{Node, NodeId};
use super::BTreeQueue;
use crate::error::InvariantViolation;

/// State carried through a full-tree walk.
struct Walk {
    leaf_depth: Option<usize>,
    reachable: usize,
}

impl<T, C> BTreeQueue<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Walk the whole tree and verify its structural invariants: global
    /// order, node occupancy, cached sizes, uniform leaf depth, separator
    /// bounds, the cached head leaf and the node arena bookkeeping.
    ///
    /// O(n). For tests and debugging; production paths never call it.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut walk = Walk {
            leaf_depth: None,
            reachable: 0,
        };
        self.check_node(self.root, 0, None, None, &mut walk)?;

        let mut leftmost = self.root;
        while let Node::Internal(node) = &self.nodes[leftmost] {
            leftmost = node.children[0];
        }
        if leftmost != self.head {
            return Err(InvariantViolation::Head {
                cached: self.head,
                actual: leftmost,
            });
        }

        let mut prev: Option<&T> = None;
        for (rank, value) in self.iter().enumerate() {
            if let Some(prev) = prev {
                if (self.cmp)(prev, value).is_gt() {
                    return Err(InvariantViolation::Order { rank });
                }
            }
            prev = Some(value);
        }

        let vacant = self.vacant_slots();
        let distinct: HashSet<NodeId> = self.free.iter().copied().collect();
        let free_ok = distinct.len() == self.free.len()
            && self
                .free
                .iter()
                .all(|&id| matches!(self.nodes.get(id), Some(Node::Vacant)));
        if !free_ok || vacant != self.free.len() || walk.reachable + vacant != self.nodes.len() {
            return Err(self.arena_violation(walk.reachable));
        }
        Ok(())
    }

    /// Returns the number of values below `id`.
    fn check_node<'a>(
        &'a self,
        id: NodeId,
        depth: usize,
        lower: Option<&'a T>,
        upper: Option<&'a T>,
        walk: &mut Walk,
    ) -> Result<usize, InvariantViolation> {
        walk.reachable += 1;
        let is_root = id == self.root;
        let within = |v: &T| {
            lower.map_or(true, |lo| (self.cmp)(lo, v).is_le())
                && upper.map_or(true, |hi| (self.cmp)(v, hi).is_le())
        };

        match &self.nodes[id] {
            Node::Vacant => Err(self.arena_violation(walk.reachable)),
            Node::Leaf(values) => {
                let entries = values.len();
                let min = if is_root { 0 } else { self.min_entries() };
                if entries < min || entries > self.order {
                    return Err(InvariantViolation::Occupancy {
                        node: id,
                        entries,
                        min,
                        max: self.order,
                    });
                }
                if !values.iter().all(|v| within(v)) {
                    return Err(InvariantViolation::Separator { node: id });
                }
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(InvariantViolation::Depth {
                            node: id,
                            depth,
                            expected,
                        });
                    }
                    Some(_) => {}
                }
                Ok(entries)
            }
            Node::Internal(node) => {
                let entries = node.children.len();
                let min = if is_root { 2 } else { self.min_entries() };
                if entries < min || entries > self.order {
                    return Err(InvariantViolation::Occupancy {
                        node: id,
                        entries,
                        min,
                        max: self.order,
                    });
                }
                if node.keys.len() + 1 != entries {
                    return Err(InvariantViolation::Shape {
                        node: id,
                        keys: node.keys.len(),
                        children: entries,
                    });
                }
                if !node.keys.iter().all(|k| within(k)) {
                    return Err(InvariantViolation::Separator { node: id });
                }

                let mut actual = 0;
                for (i, &child) in node.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(&node.keys[i - 1]) };
                    let hi = node.keys.get(i).or(upper);
                    actual += self.check_node(child, depth + 1, lo, hi, walk)?;
                }
                if actual != node.size {
                    return Err(InvariantViolation::Size {
                        node: id,
                        cached: node.size,
                        actual,
                    });
                }
                Ok(actual)
            }
        }
    }

    fn vacant_slots(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Vacant))
            .count()
    }

    fn arena_violation(&self, reachable: usize) -> InvariantViolation {
        InvariantViolation::Arena {
            slots: self.nodes.len(),
            reachable,
            vacant: self.vacant_slots(),
            free: self.free.len(),
        }
    }
}
