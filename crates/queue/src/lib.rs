//! In-memory work queues.
//!
//! [`BTreeQueue`] is an order-statistic priority queue with rank lookups,
//! [`ArrayQueue`] a growable FIFO ring, and [`BlockingQueue`] puts either
//! behind a mutex for producer/consumer use across threads.

pub mod blocking;
pub mod btree;
pub mod error;
pub mod ring;
pub mod serial;

pub use blocking::{BlockingQueue, DynQueue};
pub use btree::{BTreeQueue, Iter, NaturalOrder, DEFAULT_ORDER, MIN_ORDER};
pub use error::{InvariantViolation, QueueError};
pub use ring::ArrayQueue;
pub use serial::SerialQueue;
