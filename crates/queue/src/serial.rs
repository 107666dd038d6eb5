//! Single-threaded queue surface shared by the backing stores.

/// A queue owned by one thread at a time.
///
/// [`BlockingQueue`](crate::BlockingQueue) wraps any implementation and adds
/// locking and blocking waits on top.
pub trait SerialQueue<T> {
    /// Insert a value. Returns `false` only if the store refused it.
    fn add(&mut self, value: T) -> bool;

    /// Remove the next value in removal order.
    fn poll(&mut self) -> Option<T>;

    fn peek(&self) -> Option<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All values in removal order.
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone;

    /// Drop every value and release storage back to the initial footprint.
    fn clear(&mut self);

    /// Number of value slots currently allocated.
    fn internal_capacity(&self) -> usize;
}

impl<T, Q: SerialQueue<T> + ?Sized> SerialQueue<T> for Box<Q> {
    fn add(&mut self, value: T) -> bool {
        (**self).add(value)
    }

    fn poll(&mut self) -> Option<T> {
        (**self).poll()
    }

    fn peek(&self) -> Option<&T> {
        (**self).peek()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        (**self).to_vec()
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn internal_capacity(&self) -> usize {
        (**self).internal_capacity()
    }
}
