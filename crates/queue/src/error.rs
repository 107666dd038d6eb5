//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A blocked `take`/`poll_timeout` was cancelled by `interrupt()`.
    #[error("wait interrupted")]
    Interrupted,

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Structural defect found by `BTreeQueue::check_invariants`.
///
/// Never produced by normal operation; any of these means a logic bug in
/// the tree, not bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("values out of order at rank {rank}")]
    Order { rank: usize },

    #[error("node {node} holds {entries} entries, expected {min}..={max}")]
    Occupancy {
        node: usize,
        entries: usize,
        min: usize,
        max: usize,
    },

    #[error("node {node} has {keys} separators for {children} children")]
    Shape {
        node: usize,
        keys: usize,
        children: usize,
    },

    #[error("node {node} caches size {cached}, subtree holds {actual}")]
    Size {
        node: usize,
        cached: usize,
        actual: usize,
    },

    #[error("leaf {node} at depth {depth}, other leaves at depth {expected}")]
    Depth {
        node: usize,
        depth: usize,
        expected: usize,
    },

    #[error("node {node} holds a value outside its separator bounds")]
    Separator { node: usize },

    #[error("cached head leaf is {cached}, leftmost leaf is {actual}")]
    Head { cached: usize, actual: usize },

    #[error("arena has {slots} slots: {reachable} reachable, {vacant} vacant, {free} on the free list")]
    Arena {
        slots: usize,
        reachable: usize,
        vacant: usize,
        free: usize,
    },
}
