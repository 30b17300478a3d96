use alloy_primitives::{Address, Bytes, B256};
use hearth_primitives::StorageKey;
use hearth_trie::{StorageDb, StorageDbError};

/// Database collaborator handing out per-account storage backends.
#[auto_impl::auto_impl(&mut, Box)]
pub trait Database {
    /// The per-account backend handle type.
    type StorageDb: StorageDb;

    /// Opens the storage backend for `address`.
    ///
    /// Idempotent per address within a process lifetime; the journal calls
    /// this at most once per address between resets.
    fn open_storage_db(&mut self, address: Address) -> Result<Self::StorageDb, StorageDbError>;
}

/// State-level collaborator the journal publishes storage roots to.
///
/// The journal is otherwise account-agnostic; the existence check encodes
/// the post-self-destruct rule, where storage written during the transaction
/// that destroyed its account must not resurface as a root update.
#[auto_impl::auto_impl(&mut, Box)]
pub trait StateProvider {
    /// Returns `true` if the account currently exists in the state.
    fn account_exists(&self, address: Address) -> bool;

    /// Returns the current storage root of `address`, used to seed a freshly
    /// opened trie.
    fn storage_root_of(&self, address: Address) -> B256;

    /// Publishes a new storage root for `address`.
    ///
    /// Called during commit only; idempotent and order-independent across
    /// addresses within a single commit.
    fn update_storage_root(&mut self, address: Address, root: B256);
}

/// Commit-time observer of surviving storage writes.
#[auto_impl::auto_impl(&mut, Box)]
pub trait StorageTracer {
    /// Reports a write that survived journal flattening and was applied to
    /// its trie.
    fn trace_storage_change(&mut self, key: StorageKey, value: &Bytes);
}

/// The no-op tracer.
impl StorageTracer for () {
    fn trace_storage_change(&mut self, _key: StorageKey, _value: &Bytes) {}
}
