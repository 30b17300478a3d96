//! Transactional per-account storage journal for the hearth execution
//! engine.
//!
//! During evaluation of a block the VM issues an arbitrary, interleaved
//! stream of reads and writes across many (account, slot) pairs, and may at
//! any point revert back to a previously captured snapshot before committing
//! the survivors to the persistent tries. [`StorageProvider`] buffers that
//! traffic in a single linear [`Journal`]:
//!
//! - reads are served from the journal after the first access per slot and
//!   recorded as [`ChangeRecord::Materialized`] entries,
//! - writes append [`ChangeRecord::Updated`] entries,
//! - a snapshot is the journal cursor, an integer,
//! - revert is a bounded reverse walk that erases writes but keeps
//!   read-through cache entries alive,
//! - commit flushes the newest write per slot into the per-account
//!   [`StorageTrie`](hearth_trie::StorageTrie)s and publishes each touched
//!   account's new storage root to the [`StateProvider`].
//!
//! The journal is used by a serial VM executor: no operation is re-entrant
//! and nothing is shared across threads. Atomicity comes from the
//! snapshot/revert protocol itself, not from locks.

mod error;
pub use error::{JournalCorruption, StorageError};

mod journal;
pub use journal::{ChangeRecord, Journal, SnapshotId};

mod provider;
pub use provider::StorageProvider;

mod traits;
pub use traits::{Database, StateProvider, StorageTracer};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use hearth_primitives::StorageKey;
