//! Entity identifiers and the counters that hand them out.

use std::fmt;

/// Identifier of an item. Unique within one menagerie, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub i64);

/// Identifier of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id counter owned by a [`Menagerie`](crate::Menagerie).
///
/// Ids are reserved before the entity exists anywhere else, so a crash
/// between reservation and persistence leaves an unused id behind, never a
/// collision with a stored row.
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    next: i64,
}

impl IdCounter {
    pub fn new(next: i64) -> Self {
        Self { next }
    }

    /// Hand out the next id and advance.
    pub fn reserve(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Make sure `id` will never be handed out.
    pub fn observe(&mut self, id: i64) {
        self.next = self.next.max(id + 1);
    }

    /// The id the next [`reserve`](Self::reserve) call would return.
    pub fn peek(&self) -> i64 {
        self.next
    }
}
