//! Mock collaborators for storage journal tests.

use crate::{Database, StateProvider, StorageTracer};
use alloy_primitives::{Address, Bytes, B256, U256};
use hearth_primitives::StorageKey;
use hearth_trie::{MemoryStorageDb, StorageDb, StorageDbError, EMPTY_ROOT_HASH};
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

/// Counting [`StorageDb`] handle over shared in-memory storage.
///
/// Clones share the backing map and the counters, so a test can keep a
/// window into a handle after it has moved into the trie registry.
#[derive(Clone, Debug, Default)]
pub struct CountingStorageDb {
    inner: Rc<RefCell<MemoryStorageDb>>,
    reads: Rc<Cell<usize>>,
    writes: Rc<Cell<usize>>,
}

impl CountingStorageDb {
    /// Number of `get` calls that reached the backend.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Number of `upsert` and `remove` calls that reached the backend.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Direct, uncounted view of the value stored under `slot`.
    pub fn stored(&self, slot: U256) -> Option<Bytes> {
        self.inner.borrow().get(B256::new(slot.to_be_bytes())).expect("memory backend")
    }

    /// Direct, uncounted view of all stored entries.
    pub fn stored_entries(&self) -> Vec<(B256, Bytes)> {
        self.inner.borrow().entries().expect("memory backend")
    }

    /// Seeds a value without counting the write.
    pub fn seed(&self, slot: U256, value: Bytes) {
        self.inner
            .borrow_mut()
            .upsert(B256::new(slot.to_be_bytes()), value)
            .expect("memory backend");
    }
}

impl StorageDb for CountingStorageDb {
    fn get(&self, slot: B256) -> Result<Option<Bytes>, StorageDbError> {
        self.reads.set(self.reads.get() + 1);
        self.inner.borrow().get(slot)
    }

    fn upsert(&mut self, slot: B256, value: Bytes) -> Result<(), StorageDbError> {
        self.writes.set(self.writes.get() + 1);
        self.inner.borrow_mut().upsert(slot, value)
    }

    fn remove(&mut self, slot: B256) -> Result<(), StorageDbError> {
        self.writes.set(self.writes.get() + 1);
        self.inner.borrow_mut().remove(slot)
    }

    fn entries(&self) -> Result<Vec<(B256, Bytes)>, StorageDbError> {
        self.inner.borrow().entries()
    }
}

/// [`Database`] collaborator handing out per-address counting backends.
///
/// Handles for the same address share storage, and the mock keeps its own
/// window into each, so assertions stay possible after a handle moves into
/// the journal.
#[derive(Clone, Debug, Default)]
pub struct MockDatabase {
    dbs: Rc<RefCell<HashMap<Address, CountingStorageDb>>>,
    opens: Rc<Cell<usize>>,
}

impl MockDatabase {
    /// Returns the shared backend for `address`, creating it if needed.
    pub fn db(&self, address: Address) -> CountingStorageDb {
        self.dbs.borrow_mut().entry(address).or_default().clone()
    }

    /// Number of `open_storage_db` calls served.
    pub fn opens(&self) -> usize {
        self.opens.get()
    }
}

impl Database for MockDatabase {
    type StorageDb = CountingStorageDb;

    fn open_storage_db(&mut self, address: Address) -> Result<Self::StorageDb, StorageDbError> {
        self.opens.set(self.opens.get() + 1);
        Ok(self.db(address))
    }
}

/// Recording [`StateProvider`] with configurable account existence.
///
/// Every account exists until [`Self::destroy`] is called for it; storage
/// roots default to [`EMPTY_ROOT_HASH`] and follow published updates.
#[derive(Clone, Debug, Default)]
pub struct MockStateProvider {
    roots: Rc<RefCell<HashMap<Address, B256>>>,
    destroyed: Rc<RefCell<Vec<Address>>>,
    updates: Rc<RefCell<Vec<(Address, B256)>>>,
}

impl MockStateProvider {
    /// Sets the storage root reported for `address`.
    pub fn set_storage_root(&self, address: Address, root: B256) {
        self.roots.borrow_mut().insert(address, root);
    }

    /// Marks `address` as no longer existing.
    pub fn destroy(&self, address: Address) {
        self.destroyed.borrow_mut().push(address);
    }

    /// Returns every `update_storage_root` call received, in order.
    pub fn updates(&self) -> Vec<(Address, B256)> {
        self.updates.borrow().clone()
    }
}

impl StateProvider for MockStateProvider {
    fn account_exists(&self, address: Address) -> bool {
        !self.destroyed.borrow().contains(&address)
    }

    fn storage_root_of(&self, address: Address) -> B256 {
        self.roots.borrow().get(&address).copied().unwrap_or(EMPTY_ROOT_HASH)
    }

    fn update_storage_root(&mut self, address: Address, root: B256) {
        self.updates.borrow_mut().push((address, root));
        self.roots.borrow_mut().insert(address, root);
    }
}

/// Tracer collecting every reported write.
#[derive(Clone, Debug, Default)]
pub struct CollectingTracer(pub Vec<(StorageKey, Bytes)>);

impl StorageTracer for CollectingTracer {
    fn trace_storage_change(&mut self, key: StorageKey, value: &Bytes) {
        self.0.push((key, value.clone()));
    }
}
