use crate::{StorageDb, StorageDbError};
use alloy_primitives::{map::HashMap, Bytes, B256, U256};
use alloy_trie::{HashBuilder, Nibbles, EMPTY_ROOT_HASH};
use tracing::trace;

/// A per-account storage trie with a Keccak-256 root commitment.
///
/// Values live in the backend as a flat slot → value set; the trie layers a
/// per-slot read cache on top and recomputes the root commitment on demand
/// by walking the backend entries through a [`HashBuilder`]. Repeated reads
/// of the same slot hit the backend once; the root handed over at
/// construction is served without recomputation until the first write.
///
/// Setting a slot to the empty byte string removes it, so a value of zero
/// never occupies a leaf.
#[derive(Debug)]
pub struct StorageTrie<D> {
    /// The backend handle for this account's entries.
    db: D,
    /// Slot values observed or written since the trie was opened.
    cache: HashMap<U256, Bytes>,
    /// The current root commitment; vacated by writes.
    root: Option<B256>,
}

impl<D: StorageDb> StorageTrie<D> {
    /// Creates a trie over `db` whose current contents commit to `root`.
    pub fn new(db: D, root: B256) -> Self {
        Self { db, cache: HashMap::default(), root: Some(root) }
    }

    /// Returns the value stored at `slot`, the empty byte string if the slot
    /// is unset.
    pub fn get(&mut self, slot: U256) -> Result<Bytes, StorageDbError> {
        if let Some(value) = self.cache.get(&slot) {
            return Ok(value.clone());
        }
        let value = self.db.get(B256::new(slot.to_be_bytes()))?.unwrap_or_default();
        self.cache.insert(slot, value.clone());
        Ok(value)
    }

    /// Inserts or overwrites the value at `slot`. The empty byte string
    /// removes the slot.
    pub fn set(&mut self, slot: U256, value: Bytes) -> Result<(), StorageDbError> {
        let key = B256::new(slot.to_be_bytes());
        if value.is_empty() {
            self.db.remove(key)?;
        } else {
            self.db.upsert(key, value.clone())?;
        }
        self.cache.insert(slot, value);
        self.root = None;
        Ok(())
    }

    /// Returns the Keccak-256 commitment to the current contents.
    pub fn root_hash(&mut self) -> Result<B256, StorageDbError> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let root = storage_root(self.db.entries()?);
        self.root = Some(root);
        Ok(root)
    }
}

/// Computes the storage root for the given entries.
///
/// Entries must be in ascending slot order. Keys are nibble-unpacked
/// big-endian slot images and values are RLP byte strings, the canonical
/// storage-leaf encoding, so the result agrees with a reference
/// Merkle-Patricia trie built from the same entries.
pub fn storage_root<I>(entries: I) -> B256
where
    I: IntoIterator<Item = (B256, Bytes)>,
{
    let mut hash_builder = HashBuilder::default();
    let mut leaves_added = 0usize;
    for (slot, value) in entries {
        hash_builder.add_leaf(Nibbles::unpack(slot), &alloy_rlp::encode(value.as_ref()));
        leaves_added += 1;
    }
    if leaves_added == 0 {
        return EMPTY_ROOT_HASH;
    }

    let root = hash_builder.root();
    trace!(target: "trie::storage_root", %root, leaves_added, "calculated storage root");
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorageDb;
    use alloy_primitives::{bytes, keccak256};
    use alloy_trie::nodes::LeafNode;
    use std::{cell::Cell, rc::Rc};

    /// Backend wrapper counting every call that reaches the store.
    #[derive(Debug, Default)]
    struct CountingDb {
        inner: MemoryStorageDb,
        reads: Rc<Cell<usize>>,
        writes: Rc<Cell<usize>>,
        walks: Rc<Cell<usize>>,
    }

    impl StorageDb for CountingDb {
        fn get(&self, slot: B256) -> Result<Option<Bytes>, StorageDbError> {
            self.reads.set(self.reads.get() + 1);
            self.inner.get(slot)
        }

        fn upsert(&mut self, slot: B256, value: Bytes) -> Result<(), StorageDbError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.upsert(slot, value)
        }

        fn remove(&mut self, slot: B256) -> Result<(), StorageDbError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.remove(slot)
        }

        fn entries(&self) -> Result<Vec<(B256, Bytes)>, StorageDbError> {
            self.walks.set(self.walks.get() + 1);
            self.inner.entries()
        }
    }

    #[test]
    fn empty_storage_commits_to_empty_root() {
        assert_eq!(storage_root(Vec::<(B256, Bytes)>::new()), EMPTY_ROOT_HASH);

        let mut trie = StorageTrie::new(MemoryStorageDb::new(), EMPTY_ROOT_HASH);
        assert_eq!(trie.root_hash().unwrap(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn single_leaf_matches_reference_encoding() {
        let slot = B256::new(U256::from(7).to_be_bytes());
        let value = bytes!("2a");

        // The root of a one-entry trie is the hash of a single leaf node
        // carrying the full key.
        let leaf = LeafNode::new(Nibbles::unpack(slot), alloy_rlp::encode(value.as_ref()));
        let expected = keccak256(alloy_rlp::encode(&leaf));

        assert_eq!(storage_root([(slot, value)]), expected);
    }

    #[test]
    fn root_tracks_inserts_and_removals() {
        let mut trie = StorageTrie::new(MemoryStorageDb::new(), EMPTY_ROOT_HASH);

        trie.set(U256::from(1), bytes!("0badcafe")).unwrap();
        trie.set(U256::from(2), bytes!("beef")).unwrap();
        let both = trie.root_hash().unwrap();

        trie.set(U256::from(2), Bytes::new()).unwrap();
        let one = trie.root_hash().unwrap();
        assert_ne!(both, one);

        // Agrees with a fresh computation over the surviving entry.
        let slot = B256::new(U256::from(1).to_be_bytes());
        assert_eq!(one, storage_root([(slot, bytes!("0badcafe"))]));
    }

    #[test]
    fn zero_delete_restores_prior_root() {
        let mut trie = StorageTrie::new(MemoryStorageDb::new(), EMPTY_ROOT_HASH);

        trie.set(U256::from(3), bytes!("ab")).unwrap();
        assert_ne!(trie.root_hash().unwrap(), EMPTY_ROOT_HASH);

        trie.set(U256::from(3), Bytes::new()).unwrap();
        assert_eq!(trie.root_hash().unwrap(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn get_memoizes_backend_reads() {
        let db = CountingDb::default();
        let reads = db.reads.clone();
        let mut trie = StorageTrie::new(db, EMPTY_ROOT_HASH);

        assert_eq!(trie.get(U256::from(9)).unwrap(), Bytes::new());
        assert_eq!(trie.get(U256::from(9)).unwrap(), Bytes::new());
        assert_eq!(reads.get(), 1);

        // A write is observable through the cache without another read.
        trie.set(U256::from(9), bytes!("ff")).unwrap();
        assert_eq!(trie.get(U256::from(9)).unwrap(), bytes!("ff"));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn set_writes_through_once() {
        let db = CountingDb::default();
        let writes = db.writes.clone();
        let mut trie = StorageTrie::new(db, EMPTY_ROOT_HASH);

        trie.set(U256::from(1), bytes!("01")).unwrap();
        assert_eq!(writes.get(), 1);
        trie.set(U256::from(1), Bytes::new()).unwrap();
        assert_eq!(writes.get(), 2);
    }

    #[test]
    fn constructor_root_served_until_first_write() {
        let db = CountingDb::default();
        let walks = db.walks.clone();
        let seeded = B256::repeat_byte(0x11);
        let mut trie = StorageTrie::new(db, seeded);

        assert_eq!(trie.root_hash().unwrap(), seeded);
        trie.get(U256::from(5)).unwrap();
        assert_eq!(trie.root_hash().unwrap(), seeded);
        assert_eq!(walks.get(), 0);

        trie.set(U256::from(5), bytes!("aa")).unwrap();
        assert_ne!(trie.root_hash().unwrap(), seeded);
        assert_eq!(walks.get(), 1);

        // Recomputed root is cached until the next write.
        trie.root_hash().unwrap();
        assert_eq!(walks.get(), 1);
    }
}
