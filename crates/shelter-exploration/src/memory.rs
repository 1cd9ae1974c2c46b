//! In-memory implementation of the collaborator traits.
//!
//! [`InMemoryVault`] keeps vaults, their storage, and dwellers in
//! mutex-protected maps. It backs the engine binary and the tests, and can
//! be told to fail specific operations to exercise the engine's error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use shelter_types::{
    Dweller, DwellerId, LootItem, RoomId, SpecialStats, StorageSpace, VaultId,
};

use crate::error::StoreError;
use crate::store::{DwellerStore, StorageStore};

/// A collaborator operation that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailPoint {
    /// [`DwellerStore::unassign_from_room`].
    UnassignFromRoom,
    /// [`DwellerStore::set_exploring`].
    SetExploring,
    /// [`DwellerStore::credit_caps`].
    CreditCaps,
    /// [`DwellerStore::credit_experience`].
    CreditExperience,
    /// [`StorageStore::get_space`].
    GetSpace,
    /// [`StorageStore::commit_items`].
    CommitItems,
}

/// Vault-level record: treasury and storage.
#[derive(Debug, Clone)]
struct VaultRecord {
    caps: u64,
    space: StorageSpace,
    items: Vec<LootItem>,
}

#[derive(Debug, Default)]
struct VaultState {
    vaults: BTreeMap<VaultId, VaultRecord>,
    dwellers: BTreeMap<DwellerId, Dweller>,
    failing: BTreeSet<FailPoint>,
}

impl VaultState {
    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.failing.contains(&point) {
            return Err(StoreError::Unavailable {
                reason: format!("injected failure at {point:?}"),
            });
        }
        Ok(())
    }

    fn vault_mut(&mut self, vault_id: VaultId) -> Result<&mut VaultRecord, StoreError> {
        self.vaults
            .get_mut(&vault_id)
            .ok_or(StoreError::VaultNotFound(vault_id))
    }

    fn dweller_mut(&mut self, dweller_id: DwellerId) -> Result<&mut Dweller, StoreError> {
        self.dwellers
            .get_mut(&dweller_id)
            .ok_or(StoreError::DwellerNotFound(dweller_id))
    }
}

/// Mutex-backed vault, dweller, and storage records.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    state: Mutex<VaultState>,
}

impl InMemoryVault {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a vault with the given storage capacity and usage.
    pub fn add_vault(&self, max_space: u32, used_space: u32) -> VaultId {
        let id = VaultId::new();
        self.lock().vaults.insert(
            id,
            VaultRecord {
                caps: 0,
                space: StorageSpace {
                    used_space,
                    max_space,
                },
                items: Vec::new(),
            },
        );
        id
    }

    /// Register a level-1 dweller in an existing vault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VaultNotFound`] if the vault is unknown.
    pub fn add_dweller(
        &self,
        vault_id: VaultId,
        name: &str,
        special: SpecialStats,
        room_id: Option<RoomId>,
    ) -> Result<DwellerId, StoreError> {
        let mut state = self.lock();
        if !state.vaults.contains_key(&vault_id) {
            return Err(StoreError::VaultNotFound(vault_id));
        }
        let id = DwellerId::new();
        state.dwellers.insert(
            id,
            Dweller {
                id,
                vault_id,
                name: name.to_owned(),
                level: 1,
                experience: 0,
                special,
                room_id,
                exploring: false,
            },
        );
        Ok(id)
    }

    /// Make `point` fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, point: FailPoint) {
        self.lock().failing.insert(point);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Caps in a vault's treasury.
    pub fn vault_caps(&self, vault_id: VaultId) -> Option<u64> {
        self.lock().vaults.get(&vault_id).map(|v| v.caps)
    }

    /// Items held in a vault's storage, in commit order.
    pub fn stored_items(&self, vault_id: VaultId) -> Vec<LootItem> {
        self.lock()
            .vaults
            .get(&vault_id)
            .map(|v| v.items.clone())
            .unwrap_or_default()
    }

    /// Snapshot of a dweller record.
    pub fn dweller(&self, dweller_id: DwellerId) -> Option<Dweller> {
        self.lock().dwellers.get(&dweller_id).cloned()
    }
}

impl DwellerStore for InMemoryVault {
    fn get_dweller(&self, dweller_id: DwellerId) -> Result<Dweller, StoreError> {
        self.lock()
            .dwellers
            .get(&dweller_id)
            .cloned()
            .ok_or(StoreError::DwellerNotFound(dweller_id))
    }

    fn is_dweller_exploring(&self, dweller_id: DwellerId) -> Result<bool, StoreError> {
        self.lock()
            .dwellers
            .get(&dweller_id)
            .map(|d| d.exploring)
            .ok_or(StoreError::DwellerNotFound(dweller_id))
    }

    fn unassign_from_room(&self, dweller_id: DwellerId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check(FailPoint::UnassignFromRoom)?;
        state.dweller_mut(dweller_id)?.room_id = None;
        Ok(())
    }

    fn set_exploring(&self, dweller_id: DwellerId, exploring: bool) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check(FailPoint::SetExploring)?;
        state.dweller_mut(dweller_id)?.exploring = exploring;
        Ok(())
    }

    fn credit_caps(&self, vault_id: VaultId, amount: u64) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check(FailPoint::CreditCaps)?;
        let vault = state.vault_mut(vault_id)?;
        vault.caps = vault.caps.saturating_add(amount);
        Ok(())
    }

    fn credit_experience(&self, dweller_id: DwellerId, amount: u64) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check(FailPoint::CreditExperience)?;
        let dweller = state.dweller_mut(dweller_id)?;
        dweller.experience = dweller.experience.saturating_add(amount);
        Ok(())
    }
}

impl StorageStore for InMemoryVault {
    fn get_space(&self, vault_id: VaultId) -> Result<StorageSpace, StoreError> {
        let state = self.lock();
        state.check(FailPoint::GetSpace)?;
        state
            .vaults
            .get(&vault_id)
            .map(|v| v.space)
            .ok_or(StoreError::VaultNotFound(vault_id))
    }

    fn commit_items(&self, vault_id: VaultId, items: &[LootItem]) -> Result<u32, StoreError> {
        let mut state = self.lock();
        state.check(FailPoint::CommitItems)?;
        let vault = state.vault_mut(vault_id)?;

        let requested = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let free = vault.space.free_slots();
        if requested > free {
            return Err(StoreError::CapacityExceeded {
                vault_id,
                requested,
                free,
            });
        }

        vault.space.used_space = vault.space.used_space.saturating_add(requested);
        vault.items.extend_from_slice(items);
        Ok(vault.space.used_space)
    }
}
