//! Collaborator interfaces consumed by the coordinator.
//!
//! The exploration engine never owns dweller, vault, or storage records. It
//! reaches them through these traits, injected into the coordinator as
//! `Arc<dyn ...>`. Production wires them to the game database; tests and
//! the engine binary use [`InMemoryVault`](crate::memory::InMemoryVault).

use shelter_types::{Dweller, DwellerId, LootItem, StorageSpace, VaultId};

use crate::error::StoreError;

/// Access to dweller and vault records.
pub trait DwellerStore: Send + Sync {
    /// Fetch a dweller record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DwellerNotFound`] for an unknown dweller.
    fn get_dweller(&self, dweller_id: DwellerId) -> Result<Dweller, StoreError>;

    /// Whether the store already considers the dweller out exploring.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    fn is_dweller_exploring(&self, dweller_id: DwellerId) -> Result<bool, StoreError>;

    /// Remove the dweller from whatever room they work in.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn unassign_from_room(&self, dweller_id: DwellerId) -> Result<(), StoreError>;

    /// Flag the dweller as exploring (or back home).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn set_exploring(&self, dweller_id: DwellerId, exploring: bool) -> Result<(), StoreError>;

    /// Add caps to the vault treasury.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn credit_caps(&self, vault_id: VaultId, amount: u64) -> Result<(), StoreError>;

    /// Add experience to a dweller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn credit_experience(&self, dweller_id: DwellerId, amount: u64) -> Result<(), StoreError>;
}

/// Access to a vault's slot-counted storage.
pub trait StorageStore: Send + Sync {
    /// Current storage usage and capacity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VaultNotFound`] for an unknown vault.
    fn get_space(&self, vault_id: VaultId) -> Result<StorageSpace, StoreError>;

    /// Store items, one slot each, returning the new `used_space`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] if the items do not fit, or
    /// another [`StoreError`] if the write fails. A failed call stores
    /// nothing.
    fn commit_items(&self, vault_id: VaultId, items: &[LootItem]) -> Result<u32, StoreError>;
}
