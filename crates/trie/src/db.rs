use alloy_primitives::{Bytes, B256};
use derive_more::Display;

/// Backend contract for a single account's storage entries.
///
/// A handle is obtained from the database collaborator once per account and
/// stays valid for the life of the journal that opened it. Entries are keyed
/// by the big-endian 32-byte slot image; absent slots read as `None`.
#[auto_impl::auto_impl(&mut, Box)]
pub trait StorageDb {
    /// Returns the value stored under `slot`, or `None` if the slot is
    /// unset.
    fn get(&self, slot: B256) -> Result<Option<Bytes>, StorageDbError>;

    /// Inserts or overwrites the value stored under `slot`.
    fn upsert(&mut self, slot: B256, value: Bytes) -> Result<(), StorageDbError>;

    /// Removes the value stored under `slot`, if any.
    fn remove(&mut self, slot: B256) -> Result<(), StorageDbError>;

    /// Returns all entries in ascending slot order.
    ///
    /// Consumed by root computation, which feeds the entries into a hash
    /// builder and therefore relies on the ordering.
    fn entries(&self) -> Result<Vec<(B256, Bytes)>, StorageDbError>;
}

/// Error returned by a storage database backend.
///
/// Backend faults are opaque to the layers above: they are surfaced
/// unchanged to the block-processing loop, which decides whether to retry
/// the block or halt.
#[derive(thiserror::Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum StorageDbError {
    /// The backend failed to serve the request.
    #[display("backing store failure: {_0}")]
    Backend(String),
}

impl StorageDbError {
    /// Returns a [`StorageDbError`] with the `Backend` variant.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend(reason.into())
    }
}

/// In-memory [`StorageDb`] backed by a [`BTreeMap`](std::collections::BTreeMap),
/// used as the reference backend in tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Clone, Debug, Default)]
pub struct MemoryStorageDb {
    entries: std::collections::BTreeMap<B256, Bytes>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryStorageDb {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl StorageDb for MemoryStorageDb {
    fn get(&self, slot: B256) -> Result<Option<Bytes>, StorageDbError> {
        Ok(self.entries.get(&slot).cloned())
    }

    fn upsert(&mut self, slot: B256, value: Bytes) -> Result<(), StorageDbError> {
        self.entries.insert(slot, value);
        Ok(())
    }

    fn remove(&mut self, slot: B256) -> Result<(), StorageDbError> {
        self.entries.remove(&slot);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(B256, Bytes)>, StorageDbError> {
        Ok(self.entries.iter().map(|(k, v)| (*k, v.clone())).collect())
    }
}
