//! Sealed batches and the reason they were sealed

use std::fmt;
use std::ops::Deref;

/// Why the dispatcher sealed a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The batch reached the configured batch size
    Size,
    /// The batch timeout elapsed while the batch was non-empty
    Timeout,
    /// The queue was closed with a partial batch pending
    Close,
}

impl FlushTrigger {
    /// Lowercase name used in logs and output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Timeout => "timeout",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, non-empty group of items delivered to the consumer as one unit
///
/// Items keep the order in which they entered the queue. A batch is immutable
/// once emitted; take ownership of the items with [`Batch::into_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    items: Vec<T>,
    trigger: FlushTrigger,
}

impl<T> Batch<T> {
    pub(crate) fn new(items: Vec<T>, trigger: FlushTrigger) -> Self {
        debug_assert!(!items.is_empty(), "empty batches are never sealed");
        Self { items, trigger }
    }

    /// What caused this batch to be sealed
    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    /// Borrow the items in arrival order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the batch, returning its items in arrival order
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Batch<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
