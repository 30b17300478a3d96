//! Standalone crate for hearth storage primitive types.

use alloy_primitives::{Address, B256, U256};
use core::fmt;

/// The identity of a single contract storage slot: the owning account plus
/// the 256-bit slot index within its storage.
///
/// Two keys are equal iff both components are equal; the derived [`Hash`]
/// folds both components, so the key can be used by value wherever slots are
/// indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageKey {
    /// The account owning the slot.
    pub address: Address,
    /// The 256-bit slot index.
    pub slot: U256,
}

impl StorageKey {
    /// Creates a new [`StorageKey`].
    pub const fn new(address: Address, slot: U256) -> Self {
        Self { address, slot }
    }

    /// Returns the big-endian 32-byte image of the slot index, the form the
    /// storage trie keys its leaves by.
    pub fn slot_bytes(&self) -> B256 {
        B256::new(self.slot.to_be_bytes())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:#x}]", self.address, self.slot)
    }
}
