//! Thread-safe blocking wrapper around a [`SerialQueue`].
//!
//! One mutex guards the backing store and one condition variable wakes
//! consumers. Waiters re-check the store in a loop after every wakeup, so
//! a signal sent between a consumer's emptiness check and its wait cannot
//! be lost: the check and the wait happen under the same lock.


use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stupid_core::{QueueBacking, QueueConfig};
use tracing::debug;

use crate::btree::BTreeQueue;
use crate::error::QueueError;
use crate::ring::ArrayQueue;
use crate::serial::SerialQueue;

/// Backing store chosen at runtime from configuration.
pub type DynQueue<T> = Box<dyn SerialQueue<T> + Send>;

struct State<Q> {
    queue: Q,
    /// Bumped by `interrupt`; a waiter that sees it change gives up.
    interrupts: u64,
    /// Threads currently parked on `not_empty`.
    waiting: usize,
}

/// Producer/consumer queue shared between threads, usually behind an `Arc`.
///
/// Delivery order is the backing store's removal order: priority order
/// for [`BTreeQueue`], FIFO for [`ArrayQueue`].
pub struct BlockingQueue<T, Q = BTreeQueue<T>> {
    state: Mutex<State<Q>>,
    not_empty: Condvar,
    _values: PhantomData<fn(T) -> T>,
}

fn poisoned<G>(e: PoisonError<G>) -> QueueError {
    QueueError::LockPoisoned(e.to_string())
}

impl<T, Q: SerialQueue<T>> BlockingQueue<T, Q> {
    /// Take ownership of `queue`; nothing outside the adapter can reach it
    /// afterwards.
    pub fn new(queue: Q) -> Self {
        Self {
            state: Mutex::new(State {
                queue,
                interrupts: 0,
                waiting: 0,
            }),
            not_empty: Condvar::new(),
            _values: PhantomData,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<Q>>, QueueError> {
        self.state.lock().map_err(poisoned)
    }

    /// Insert a value and wake one waiting consumer. Never blocks.
    pub fn add(&self, value: T) -> Result<bool, QueueError> {
        let mut state = self.lock()?;
        let added = state.queue.add(value);
        if added && state.waiting > 0 {
            self.not_empty.notify_one();
        }
        Ok(added)
    }

    /// Remove the next value if there is one, without waiting.
    pub fn poll(&self) -> Result<Option<T>, QueueError> {
        Ok(self.lock()?.queue.poll())
    }

    /// Remove the next value, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` when the timeout expires.
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.take().map(Some);
        };
        let mut state = self.lock()?;
        let epoch = state.interrupts;
        loop {
            if state.interrupts != epoch {
                return Err(self.interrupted(&state));
            }
            if let Some(value) = state.queue.poll() {
                return Ok(Some(value));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            state.waiting += 1;
            let (mut guard, _) = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .map_err(poisoned)?;
            guard.waiting -= 1;
            state = guard;
        }
    }

    /// Remove the next value, waiting as long as it takes.
    ///
    /// Returns [`QueueError::Interrupted`] if [`interrupt`](Self::interrupt)
    /// is called while this thread waits.
    pub fn take(&self) -> Result<T, QueueError> {
        let mut state = self.lock()?;
        let epoch = state.interrupts;
        loop {
            if state.interrupts != epoch {
                return Err(self.interrupted(&state));
            }
            if let Some(value) = state.queue.poll() {
                return Ok(value);
            }
            state.waiting += 1;
            let mut guard = self.not_empty.wait(state).map_err(poisoned)?;
            guard.waiting -= 1;
            state = guard;
        }
    }

    /// Wake every thread currently blocked in `take` or `poll_timeout` with
    /// [`QueueError::Interrupted`]. Threads that start waiting later are
    /// unaffected.
    pub fn interrupt(&self) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state.interrupts = state.interrupts.wrapping_add(1);
        debug!(waiting = state.waiting, "blocking queue waiters interrupted");
        self.not_empty.notify_all();
        Ok(())
    }

    /// Hand a pending wakeup on, so values left behind by an interrupted
    /// waiter still reach another consumer.
    fn interrupted(&self, state: &State<Q>) -> QueueError {
        if !state.queue.is_empty() && state.waiting > 0 {
            self.not_empty.notify_one();
        }
        QueueError::Interrupted
    }

    /// Move up to `max` values into `sink` in removal order, without waiting.
    pub fn drain_to(&self, sink: &mut Vec<T>, max: usize) -> Result<usize, QueueError> {
        let mut state = self.lock()?;
        let before = sink.len();
        sink.extend(std::iter::from_fn(|| state.queue.poll()).take(max));
        Ok(sink.len() - before)
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.queue.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.lock()?.queue.is_empty())
    }

    /// Threads currently blocked waiting for a value.
    pub fn waiting_consumers(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.waiting)
    }

    /// Always `usize::MAX`: neither backing store has a hard ceiling.
    pub fn remaining_capacity(&self) -> usize {
        usize::MAX
    }

    pub fn internal_capacity(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.queue.internal_capacity())
    }

    pub fn clear(&self) -> Result<(), QueueError> {
        self.lock()?.queue.clear();
        Ok(())
    }
}

impl<T: Clone, Q: SerialQueue<T>> BlockingQueue<T, Q> {
    /// Copy of the next value, if any.
    pub fn peek(&self) -> Result<Option<T>, QueueError> {
        Ok(self.lock()?.queue.peek().cloned())
    }

    /// Snapshot of all values in removal order.
    pub fn to_vec(&self) -> Result<Vec<T>, QueueError> {
        Ok(self.lock()?.queue.to_vec())
    }
}

impl<T: Ord + Clone> BlockingQueue<T, BTreeQueue<T>> {
    /// Priority queue in natural order.
    pub fn btree() -> Self {
        Self::new(BTreeQueue::new())
    }

    pub fn btree_with_order(order: usize) -> Self {
        Self::new(BTreeQueue::with_order(order))
    }
}

impl<T> BlockingQueue<T, ArrayQueue<T>> {
    /// FIFO queue over a circular buffer.
    pub fn array() -> Self {
        Self::new(ArrayQueue::new())
    }

    pub fn array_with_capacity(initial_capacity: usize) -> Self {
        Self::new(ArrayQueue::with_capacity(initial_capacity))
    }
}

impl<T: Ord + Clone + Send + 'static> BlockingQueue<T, DynQueue<T>> {
    /// Build the backing store named by `config.backing`.
    ///
    /// `config` should already have passed [`QueueConfig::validate`].
    pub fn from_config(config: &QueueConfig) -> Self {
        let queue: DynQueue<T> = match config.backing {
            QueueBacking::BTree => Box::new(BTreeQueue::with_order(config.btree_order)),
            QueueBacking::Array => Box::new(ArrayQueue::with_capacity(config.array_initial_capacity)),
        };
        debug!(backing = %config.backing, "blocking queue created");
        Self::new(queue)
    }
}

impl<T, C> BlockingQueue<T, BTreeQueue<T, C>>
where
    T: Clone,
    C: Fn(&T, &T) -> Ordering,
{
    /// Rank of the first queued value equal to `value`.
    pub fn index_of(&self, value: &T) -> Result<Option<usize>, QueueError> {
        Ok(self.lock()?.queue.index_of(value))
    }

    /// Number of queued values strictly ahead of `value`.
    pub fn index_before(&self, value: &T) -> Result<usize, QueueError> {
        Ok(self.lock()?.queue.index_before(value))
    }

    /// Insert `value`, wake a consumer, and return the rank it was queued at.
    pub fn add_index_of(&self, value: T) -> Result<usize, QueueError> {
        let mut state = self.lock()?;
        let rank = state.queue.add_index_of(value);
        if state.waiting > 0 {
            self.not_empty.notify_one();
        }
        Ok(rank)
    }
}
