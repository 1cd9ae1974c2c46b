//! Core value structs shared between the exploration engine and its callers.
//!
//! Covers loot, dweller records, storage capacity, and the output objects
//! the engine hands back to the UI layer (`RewardsSummary`, `ProgressReport`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ExplorationStatus, ItemType, Rarity, Special};
use crate::ids::{DwellerId, RoomId, SessionId, VaultId};

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

/// A single item found in the wasteland.
///
/// Loot is created only by the reward generator and stays ephemeral until
/// the storage allocator accepts it into the vault. Each item occupies
/// exactly one storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LootItem {
    /// What kind of item this is.
    pub item_type: ItemType,
    /// Rarity tier of the item.
    pub rarity: Rarity,
    /// Value in caps.
    pub value: u64,
    /// Index of the encounter tick that produced the item.
    pub encounter: u32,
}

// ---------------------------------------------------------------------------
// Dwellers
// ---------------------------------------------------------------------------

/// S.P.E.C.I.A.L. attribute values of a dweller.
///
/// Attributes absent from the map read as zero, the most conservative
/// value for every reward formula.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpecialStats(pub BTreeMap<Special, u8>);

impl SpecialStats {
    /// Build a stat block from `(attribute, value)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Special, u8)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Return the value of an attribute, treating a missing one as zero.
    pub fn get(&self, stat: Special) -> u32 {
        self.0.get(&stat).copied().map_or(0, u32::from)
    }

    /// Set an attribute value.
    pub fn set(&mut self, stat: Special, value: u8) {
        self.0.insert(stat, value);
    }
}

/// A dweller record as held by the dweller/vault store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Dweller {
    /// Unique identifier.
    pub id: DwellerId,
    /// The vault this dweller lives in.
    pub vault_id: VaultId,
    /// Display name.
    pub name: String,
    /// Current level.
    pub level: u32,
    /// Accumulated experience points.
    pub experience: u64,
    /// S.P.E.C.I.A.L. attributes.
    pub special: SpecialStats,
    /// The room the dweller currently works in, if any.
    pub room_id: Option<RoomId>,
    /// Whether the dweller is out exploring the wasteland.
    pub exploring: bool,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Slot-counted storage capacity of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StorageSpace {
    /// Slots currently occupied.
    pub used_space: u32,
    /// Total slots available.
    pub max_space: u32,
}

impl StorageSpace {
    /// Number of slots still free (zero when the state is over-committed).
    pub const fn free_slots(&self) -> u32 {
        self.max_space.saturating_sub(self.used_space)
    }

    /// Whether every slot is taken.
    pub const fn is_full(&self) -> bool {
        self.used_space >= self.max_space
    }
}

// ---------------------------------------------------------------------------
// Engine outputs
// ---------------------------------------------------------------------------

/// Everything a finished expedition produced, as reported to the caller.
///
/// This is an output value object; the engine does not persist it beyond
/// holding it for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RewardsSummary {
    /// The session this summary belongs to.
    pub session_id: SessionId,
    /// The vault credited with caps and loot.
    pub vault_id: VaultId,
    /// The dweller credited with experience.
    pub dweller_id: DwellerId,
    /// Experience credited to the dweller.
    pub experience: u64,
    /// Caps credited to the vault.
    pub caps: u64,
    /// Distance travelled.
    pub distance: u64,
    /// Enemies the dweller defeated.
    pub enemies_defeated: u32,
    /// Non-empty encounters (caps, fights, item finds).
    pub events_encountered: u32,
    /// Loot moved into vault storage.
    pub items: Vec<LootItem>,
    /// Loot dropped because storage was full.
    pub overflow_items: Vec<LootItem>,
    /// Whether the dweller was recalled before the duration elapsed.
    pub recalled_early: bool,
    /// Progress at the moment the session ended (0 to 100).
    pub progress_percentage: f64,
    /// Storage usage after the transferred items were committed.
    pub final_used_space: u32,
}

/// Point-in-time view of an exploration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProgressReport {
    /// The session being reported.
    pub session_id: SessionId,
    /// Current lifecycle state.
    pub status: ExplorationStatus,
    /// Progress from 0 to 100.
    pub progress_percentage: f64,
    /// Seconds since the session started (frozen once the session ends).
    pub elapsed_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_special_reads_as_zero() {
        let stats = SpecialStats::from_pairs([(Special::Luck, 7)]);
        assert_eq!(stats.get(Special::Luck), 7);
        assert_eq!(stats.get(Special::Strength), 0);
        assert_eq!(SpecialStats::default().get(Special::Perception), 0);
    }

    #[test]
    fn free_slots_saturates() {
        let space = StorageSpace {
            used_space: 3,
            max_space: 5,
        };
        assert_eq!(space.free_slots(), 2);
        assert!(!space.is_full());

        let over = StorageSpace {
            used_space: 9,
            max_space: 5,
        };
        assert_eq!(over.free_slots(), 0);
        assert!(over.is_full());
    }

    #[test]
    fn special_stats_serialize_as_map() {
        let stats = SpecialStats::from_pairs([(Special::Luck, 3), (Special::Agility, 5)]);
        let json = serde_json::to_string(&stats).ok();
        assert_eq!(json.as_deref(), Some(r#"{"agility":5,"luck":3}"#));
    }
}
