use std::iter::FusedIterator;
use std::slice;

use super::node::{Node, NodeId};

/// In-order iterator over a [`BTreeQueue`](super::BTreeQueue).
pub struct Iter<'a, T> {
    nodes: &'a [Node<T>],
    /// Unvisited right siblings at each level above the current leaf.
    stack: Vec<&'a [NodeId]>,
    leaf: slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(nodes: &'a [Node<T>], root: NodeId, len: usize) -> Self {
        let mut iter = Self {
            nodes,
            stack: Vec::new(),
            leaf: <&[T]>::default().iter(),
            remaining: len,
        };
        iter.descend(root);
        iter
    }

    fn descend(&mut self, mut id: NodeId) {
        let nodes = self.nodes;
        loop {
            match &nodes[id] {
                Node::Internal(node) => {
                    self.stack.push(&node.children[1..]);
                    id = node.children[0];
                }
                Node::Leaf(values) => {
                    self.leaf = values.iter();
                    return;
                }
                Node::Vacant => return,
            }
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(value) = self.leaf.next() {
                self.remaining -= 1;
                return Some(value);
            }
            let siblings = self.stack.last_mut()?;
            let pending: &'a [NodeId] = *siblings;
            match pending.split_first() {
                Some((&next, rest)) => {
                    *siblings = rest;
                    self.descend(next);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
