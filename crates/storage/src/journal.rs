use crate::{error::JournalCorruption, StorageError};
use alloy_primitives::{
    map::{HashMap, HashSet},
    Bytes,
};
use core::fmt;
use hearth_primitives::StorageKey;
use tracing::trace;

/// Initial capacity of the journal arena, in records.
const INITIAL_CAPACITY: usize = 1024;

/// A point-in-time cursor into the journal, returned by
/// [`Journal::snapshot`].
///
/// The id is the position of the most recent record at capture time; `-1`
/// denotes the empty journal. Ids are only meaningful for the journal that
/// issued them, and only until the next commit or reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotId(isize);

impl SnapshotId {
    /// The snapshot capturing the empty journal.
    pub const EMPTY: Self = Self(-1);
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single journal entry: either a value materialized from the backing trie
/// into the cache, or a value updated by the guest.
///
/// The tag drives the revert protocol. A materialized entry is a
/// memoization, a faithful image of the on-disk slot at first access, so
/// reverting past it keeps it alive. An updated entry is a change intent,
/// and reverting past it erases its effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeRecord {
    /// A read-through image of the slot as first observed from the trie.
    Materialized {
        /// The slot the value was read from.
        key: StorageKey,
        /// The observed value; empty bytes for an unset slot.
        value: Bytes,
    },
    /// A guest write to the slot.
    Updated {
        /// The slot the value is destined for.
        key: StorageKey,
        /// The written value; empty bytes delete the slot at commit.
        value: Bytes,
    },
}

impl ChangeRecord {
    /// Returns the key the record refers to.
    pub const fn key(&self) -> StorageKey {
        match self {
            Self::Materialized { key, .. } | Self::Updated { key, .. } => *key,
        }
    }

    /// Returns the value carried by the record.
    pub const fn value(&self) -> &Bytes {
        match self {
            Self::Materialized { value, .. } | Self::Updated { value, .. } => value,
        }
    }

    /// Returns `true` for read-through entries.
    pub const fn is_materialized(&self) -> bool {
        matches!(self, Self::Materialized { .. })
    }
}

/// Append-only log of storage changes with per-key index stacks.
///
/// Records live in an arena of optional slots; `top` is the position of the
/// most recent record, `-1` when empty. For every touched key the index maps
/// to a strictly increasing stack of positions into the arena, so the
/// current value of a key is one peek away and snapshots are a single
/// integer. Vacated slots stay allocated below the high-water mark so the
/// `top + 1` lookahead guard consulted at commit remains addressable; the
/// arena is emptied only by [`Self::clear`] or a commit drain.
#[derive(Debug)]
pub struct Journal {
    /// The record arena. Slots above `top` are vacant.
    changes: Vec<Option<ChangeRecord>>,
    /// Per-key stacks of positions into `changes`.
    index: HashMap<StorageKey, Vec<usize>>,
    /// Position of the most recent record, `-1` when empty.
    top: isize,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl Journal {
    /// Creates an empty journal with room for `capacity` records before the
    /// first growth.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { changes: vec![None; capacity.max(2)], index: HashMap::default(), top: -1 }
    }

    /// Returns the number of live records.
    pub const fn len(&self) -> usize {
        (self.top + 1) as usize
    }

    /// Returns `true` if no records are live.
    pub const fn is_empty(&self) -> bool {
        self.top < 0
    }

    /// Returns the most recent record for `key`, if the key was touched
    /// since the last commit or reset.
    pub fn current(&self, key: &StorageKey) -> Option<&ChangeRecord> {
        let position = *self.index.get(key)?.last()?;
        self.changes.get(position)?.as_ref()
    }

    /// Appends a record and indexes it under its key.
    pub fn push(&mut self, record: ChangeRecord) {
        let position = (self.top + 1) as usize;
        // Keep the slot after the new top addressable for the commit-time
        // lookahead guard.
        if position + 1 >= self.changes.len() {
            self.changes.resize(self.changes.len() * 2, None);
        }
        self.index.entry(record.key()).or_default().push(position);
        self.changes[position] = Some(record);
        self.top = position as isize;
    }

    /// Captures the current cursor. O(1).
    pub const fn snapshot(&self) -> SnapshotId {
        SnapshotId(self.top)
    }

    /// Rolls the journal back to `snapshot`.
    ///
    /// Updated records past the snapshot are erased. A materialized record
    /// that is the sole surviving entry for its key is a read-through
    /// memoization introduced after the snapshot: it stays alive by being
    /// re-appended above the restored cursor, in the order the reverse walk
    /// encountered it (newest first), so a later read of the key does not
    /// query the trie again.
    pub fn revert(&mut self, snapshot: SnapshotId) -> Result<(), StorageError> {
        if snapshot.0 > self.top {
            return Err(StorageError::InvalidSnapshot { snapshot, top: SnapshotId(self.top) });
        }

        let mut preserved = Vec::new();
        let mut position = self.top;
        while position > snapshot.0 {
            let i = position as usize;
            let record = self.changes[i]
                .take()
                .ok_or(JournalCorruption::VacatedEntry { position: i })?;
            let key = record.key();
            let stack =
                self.index.get_mut(&key).ok_or(JournalCorruption::MissingIndex { key })?;

            if stack.len() == 1 && record.is_materialized() {
                // Sole read-through entry for the key; keep it alive.
                stack.pop();
                preserved.push(record);
            } else {
                let found =
                    stack.pop().ok_or(JournalCorruption::MissingIndex { key })?;
                if found != i {
                    return Err(
                        JournalCorruption::PositionMismatch { key, expected: i, found }.into()
                    );
                }
            }
            if self.index.get(&key).is_some_and(|stack| stack.is_empty()) {
                self.index.remove(&key);
            }
            position -= 1;
        }

        self.top = snapshot.0;
        trace!(
            target: "storage::journal",
            %snapshot,
            preserved = preserved.len(),
            "reverted journal"
        );

        // Renumbering the preserved records above the restored cursor keeps
        // the memoized reads addressable.
        for record in preserved {
            self.push(record);
        }
        Ok(())
    }

    /// Drains the journal for commit, returning the surviving newest record
    /// per key, newest first.
    ///
    /// On return the journal is empty. Records shadowed by a newer record
    /// for the same key are dropped: a trie root after a single write of the
    /// final value equals the root after the full write sequence.
    pub fn drain_survivors(&mut self) -> Result<Vec<ChangeRecord>, StorageError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let top = self.top as usize;
        if self.changes[top].is_none() {
            return Err(JournalCorruption::VacatedEntry { position: top }.into());
        }
        if self.changes[top + 1].is_some() {
            return Err(JournalCorruption::OccupiedLookahead { position: top + 1 }.into());
        }

        let mut seen: HashSet<_> =
            HashSet::with_capacity_and_hasher(self.len(), Default::default());
        let mut survivors = Vec::new();
        for i in (0..=top).rev() {
            let record = self.changes[i]
                .take()
                .ok_or(JournalCorruption::VacatedEntry { position: i })?;
            let key = record.key();
            if seen.contains(&key) {
                // Shadowed by a newer record; its index entry is cleared
                // wholesale below.
                continue;
            }
            let stack =
                self.index.get_mut(&key).ok_or(JournalCorruption::MissingIndex { key })?;
            let found = stack.pop().ok_or(JournalCorruption::MissingIndex { key })?;
            if found != i {
                return Err(JournalCorruption::PositionMismatch { key, expected: i, found }.into());
            }
            seen.insert(key);
            survivors.push(record);
        }

        self.top = -1;
        self.index.clear();
        trace!(target: "storage::journal", survivors = survivors.len(), "drained journal");
        Ok(survivors)
    }

    /// Clears every journal structure, keeping the arena allocation.
    pub fn clear(&mut self) {
        for slot in &mut self.changes {
            *slot = None;
        }
        self.index.clear();
        self.top = -1;
    }
}
