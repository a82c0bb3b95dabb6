//! Bounded, ordered storage for pending entries.
//!
//! Entries live in a single `VecDeque` kept sorted by `(due_at, seq)`. The
//! backing buffer is reserved once, up front, and the store refuses to grow
//! past it, so insertion never reallocates. Expected populations are small
//! (tens of entries), which makes binary search plus a shifted insert cheaper
//! in practice than a heap and keeps due entries as a contiguous prefix.
//!
//! # Invariants
//!
//! - `len() <= capacity()`
//! - entries are sorted by `due_at`, equal due times by ascending `seq`
//! - every `seq` in the store is unique

use std::collections::VecDeque;
use std::fmt;

use crate::clock::Ticks;
use crate::error::Result;

/// A scheduled callback.
pub type Job = Box<dyn FnOnce() + 'static>;

/// Position in submission order. Two entries due on the same tick fire in
/// ascending `Seq`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq(u64);

impl Seq {
    /// Hand out this number and move past it.
    pub const fn bump(&mut self) -> Self {
        let issued = *self;
        self.0 += 1;
        issued
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One pending entry: a callback and the logical time it becomes due.
pub struct Entry {
    pub due_at: Ticks,
    pub seq: Seq,
    action: Job,
}

impl Entry {
    #[must_use]
    pub fn new(due_at: Ticks, seq: Seq, action: Job) -> Self {
        Self {
            due_at,
            seq,
            action,
        }
    }

    /// Strict comparison: an entry due exactly at `horizon` is not yet due.
    #[must_use]
    pub fn is_due(&self, horizon: Ticks) -> bool {
        self.due_at < horizon
    }

    /// Consume the entry and run its callback.
    pub fn fire(self) {
        (self.action)();
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("due_at", &self.due_at)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Sorted, capacity-bounded entry container.
pub struct EntryStore {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl EntryStore {
    /// Reserve room for exactly `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut entries = VecDeque::new();
        entries.try_reserve_exact(capacity)?;
        Ok(Self { entries, capacity })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert in `(due_at, seq)` order.
    ///
    /// The caller enforces capacity (in-flight entries count against it too);
    /// a full store hands the entry back untouched.
    pub fn insert(&mut self, entry: Entry) -> std::result::Result<usize, Entry> {
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        // New entries carry the highest seq, so landing after every equal
        // due time keeps FIFO among ties.
        let at = self
            .entries
            .partition_point(|existing| existing.due_at <= entry.due_at);
        self.entries.insert(at, entry);
        Ok(at)
    }

    /// Move every entry due strictly before `horizon` into `batch`,
    /// preserving order.
    ///
    /// Due entries form a prefix, so what remains is already contiguous and
    /// sorted. Returns how many were moved.
    pub fn take_due(&mut self, horizon: Ticks, batch: &mut VecDeque<Entry>) -> usize {
        let due = self.entries.partition_point(|entry| entry.is_due(horizon));
        batch.extend(self.entries.drain(..due));
        due
    }

    /// Due time of the earliest pending entry.
    #[must_use]
    pub fn next_due(&self) -> Option<Ticks> {
        self.entries.front().map(|entry| entry.due_at)
    }

    /// Remove every entry without running it.
    pub fn drain_all(&mut self) -> VecDeque<Entry> {
        std::mem::take(&mut self.entries)
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Panic if the store is corrupted.
    ///
    /// A failure here is a bug in the scheduler, never a runtime condition.
    pub fn check_invariants(&self) {
        assert!(
            self.entries.len() <= self.capacity,
            "internal consistency: store holds {} entries but capacity is {}",
            self.entries.len(),
            self.capacity
        );
        for (a, b) in self.entries.iter().zip(self.entries.iter().skip(1)) {
            assert!(
                (a.due_at, a.seq) < (b.due_at, b.seq),
                "internal consistency: entries out of order ({} @ {} before {} @ {})",
                a.seq,
                a.due_at,
                b.seq,
                b.due_at
            );
        }
    }
}

impl fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStore")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("next_due", &self.next_due())
            .finish()
    }
}
