use crate::SnapshotId;
use derive_more::{Display, From};
use hearth_primitives::StorageKey;
use hearth_trie::StorageDbError;

/// Errors surfaced by the storage journal.
///
/// None of these are caught within the journal; all propagate to the
/// enclosing executor.
#[derive(thiserror::Error, Display, From, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// `revert` was called with a snapshot taken beyond the current journal
    /// cursor. Fatal for the transaction; never retried.
    #[display("invalid snapshot {snapshot}, journal top is {top}")]
    InvalidSnapshot {
        /// The snapshot handed to `revert`.
        snapshot: SnapshotId,
        /// The journal cursor at the time of the call.
        top: SnapshotId,
    },
    /// An internal journal invariant no longer holds. Fatal at the process
    /// level: this names an engine bug, not a recoverable condition.
    #[display("journal corrupted: {_0}")]
    JournalCorrupted(JournalCorruption),
    /// The backing store failed; surfaced unchanged so the block-processing
    /// loop can decide whether to retry the block or halt.
    #[display("{_0}")]
    BackingStore(StorageDbError),
}

/// The journal invariant a [`StorageError::JournalCorrupted`] fault names.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum JournalCorruption {
    /// A per-key index stack popped a position other than the one being
    /// walked.
    #[display("index stack for {key} popped position {found}, expected {expected}")]
    PositionMismatch {
        /// The key whose stack was popped.
        key: StorageKey,
        /// The position the walk expected to find.
        expected: usize,
        /// The position actually popped.
        found: usize,
    },
    /// A live journal slot was vacant.
    #[display("journal slot {position} vacated below the cursor")]
    VacatedEntry {
        /// The vacant position.
        position: usize,
    },
    /// The lookahead slot past the cursor was occupied.
    #[display("journal slot {position} occupied past the cursor")]
    OccupiedLookahead {
        /// The occupied position.
        position: usize,
    },
    /// A live record had no index stack for its key.
    #[display("no index stack for {key}")]
    MissingIndex {
        /// The unindexed key.
        key: StorageKey,
    },
}
