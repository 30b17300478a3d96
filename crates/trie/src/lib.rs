//! Per-account storage trie for the hearth storage layer.
//!
//! An account's storage lives in a backing store as a flat slot → value set
//! behind the [`StorageDb`] contract; [`StorageTrie`] layers a read cache and
//! a Keccak-256 root commitment on top, recomputing the root on demand by
//! walking the entries in ascending slot order through a hash builder.

mod db;
#[cfg(any(test, feature = "test-utils"))]
pub use db::MemoryStorageDb;
pub use db::{StorageDb, StorageDbError};

mod trie;
pub use trie::{storage_root, StorageTrie};

pub use alloy_trie::EMPTY_ROOT_HASH;
