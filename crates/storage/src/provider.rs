use crate::{
    journal::{ChangeRecord, Journal, SnapshotId},
    traits::{Database, StateProvider, StorageTracer},
    StorageError,
};
use alloy_primitives::{
    map::{Entry, HashMap},
    Address, Bytes, B256, U256,
};
use core::fmt;
use hearth_primitives::StorageKey;
use hearth_trie::StorageTrie;
use tracing::{debug, trace};

/// Transactional overlay over per-account storage tries.
///
/// The provider buffers the VM's storage traffic in a linear [`Journal`]:
/// reads are served from the journal after the first access per slot, writes
/// only ever append, and a snapshot is the journal cursor. At commit the
/// newest write per slot is flushed into the account's [`StorageTrie`] and
/// each touched account's new storage root is published to the state
/// provider, unless the account no longer exists, which is how storage
/// written by a transaction that then destroyed its account stays buried.
///
/// Tries are opened lazily, on the first read of an account or its first
/// write reaching commit, and are retained across commits as read caches
/// until [`Self::reset`].
pub struct StorageProvider<DB: Database, SP> {
    /// The database collaborator handing out per-account backends.
    db: DB,
    /// The state collaborator queried for account existence and roots.
    state: SP,
    /// Lazily opened per-account tries, retained across commits.
    tries: HashMap<Address, StorageTrie<DB::StorageDb>>,
    /// The change journal.
    journal: Journal,
}

impl<DB: Database, SP> fmt::Debug for StorageProvider<DB, SP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageProvider")
            .field("accounts", &self.tries.len())
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}

impl<DB, SP> StorageProvider<DB, SP>
where
    DB: Database,
    SP: StateProvider,
{
    /// Creates a provider over the given collaborators.
    pub fn new(db: DB, state: SP) -> Self {
        Self { db, state, tries: HashMap::default(), journal: Journal::default() }
    }

    /// Returns the value of `slot` in `address`'s storage, the empty byte
    /// string for an unset slot.
    ///
    /// The first access per slot reads through the account's trie and
    /// records the observed value; every later access, including after
    /// reverts, is served from the journal.
    pub fn get(&mut self, address: Address, slot: U256) -> Result<Bytes, StorageError> {
        let key = StorageKey::new(address, slot);
        if let Some(record) = self.journal.current(&key) {
            return Ok(record.value().clone());
        }
        let value = self.trie_of(address)?.get(slot)?;
        self.journal.push(ChangeRecord::Materialized { key, value: value.clone() });
        Ok(value)
    }

    /// Journals a write of `value` to `slot` in `address`'s storage.
    ///
    /// Nothing reaches the trie until commit; the empty byte string deletes
    /// the slot there.
    pub fn set(&mut self, address: Address, slot: U256, value: Bytes) {
        let key = StorageKey::new(address, slot);
        self.journal.push(ChangeRecord::Updated { key, value });
    }

    /// Captures the current journal cursor. O(1).
    pub const fn snapshot(&self) -> SnapshotId {
        self.journal.snapshot()
    }

    /// Rolls the journal back to `snapshot`, erasing writes made since while
    /// keeping read-through cache entries alive.
    pub fn revert(&mut self, snapshot: SnapshotId) -> Result<(), StorageError> {
        self.journal.revert(snapshot)
    }

    /// Finalizes the journal into the tries and the state provider.
    ///
    /// Only the newest write per slot is applied; the trie root after a
    /// single write of the final value equals the root after the full write
    /// sequence. Roots are then published for every touched account that
    /// still exists; read-through entries apply no writes but republishing
    /// their account's root is harmless by the provider's idempotence
    /// contract.
    pub fn commit(&mut self) -> Result<(), StorageError> {
        self.commit_traced(&mut ())
    }

    /// [`Self::commit`], reporting every surviving write to `tracer` as it
    /// is applied.
    pub fn commit_traced<T: StorageTracer>(&mut self, tracer: &mut T) -> Result<(), StorageError> {
        let survivors = self.journal.drain_survivors()?;
        if survivors.is_empty() {
            return Ok(());
        }

        let mut touched = Vec::new();
        for record in &survivors {
            let key = record.key();
            if !touched.contains(&key.address) {
                touched.push(key.address);
            }
            if let ChangeRecord::Updated { value, .. } = record {
                self.trie_of(key.address)?.set(key.slot, value.clone())?;
                tracer.trace_storage_change(key, value);
            }
        }

        let accounts = touched.len();
        for address in touched {
            if !self.state.account_exists(address) {
                debug!(
                    target: "storage::provider",
                    %address,
                    "skipping storage root update for destroyed account"
                );
                continue;
            }
            let root = self.trie_of(address)?.root_hash()?;
            self.state.update_storage_root(address, root);
        }

        trace!(
            target: "storage::provider",
            records = survivors.len(),
            accounts,
            "committed storage journal"
        );
        Ok(())
    }

    /// Clears the journal and drops every open trie handle. Used between
    /// unrelated transactions.
    pub fn reset(&mut self) {
        self.journal.clear();
        self.tries.clear();
        trace!(target: "storage::provider", "reset storage provider");
    }

    /// Returns the current storage root of `address`, reading through to the
    /// lazily opened trie.
    ///
    /// Journaled writes are not reflected until commit; this is the
    /// executor's debugging and receipt-construction view.
    pub fn storage_root(&mut self, address: Address) -> Result<B256, StorageError> {
        Ok(self.trie_of(address)?.root_hash()?)
    }

    /// Returns the number of live journal records.
    pub const fn len(&self) -> usize {
        self.journal.len()
    }

    /// Returns `true` if no records are journaled.
    pub const fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Returns the trie for `address`, opening it on first touch with the
    /// account's current storage root.
    fn trie_of(
        &mut self,
        address: Address,
    ) -> Result<&mut StorageTrie<DB::StorageDb>, StorageError> {
        match self.tries.entry(address) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let db = self.db.open_storage_db(address)?;
                let root = self.state.storage_root_of(address);
                trace!(target: "storage::provider", %address, %root, "opened storage trie");
                Ok(entry.insert(StorageTrie::new(db, root)))
            }
        }
    }
}
