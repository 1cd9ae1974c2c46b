//! Enumeration types for the Shelter exploration engine.
//!
//! Enums that appear in configuration files serialize in `snake_case`
//! (`legendary`, `weapon`, `luck`) so the YAML tables read naturally.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

/// The kind of item a dweller can bring back from the wasteland.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ItemType {
    /// A weapon that can be equipped by a dweller.
    Weapon,
    /// An outfit that can be worn by a dweller.
    Outfit,
    /// Junk that can be scrapped for components.
    Junk,
}

impl ItemType {
    /// Every item type, in declaration order.
    pub const ALL: [Self; 3] = [Self::Weapon, Self::Outfit, Self::Junk];
}

/// Rarity tier of a loot item.
///
/// The derived ordering is `Common < Uncommon < Rare < Legendary`. The tier
/// governs both drop weight (rarer is rarer) and storage placement priority
/// (rarer is kept first when storage overflows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Rarity {
    /// The most frequent tier.
    Common,
    /// Slightly better than common.
    Uncommon,
    /// Infrequent, valuable finds.
    Rare,
    /// The rarest tier.
    Legendary,
}

impl Rarity {
    /// Every tier, from most to least common.
    pub const ALL: [Self; 4] = [Self::Common, Self::Uncommon, Self::Rare, Self::Legendary];

    /// Numeric rank of the tier: 0 for common up to 3 for legendary.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Common => 0,
            Self::Uncommon => 1,
            Self::Rare => 2,
            Self::Legendary => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Exploration
// ---------------------------------------------------------------------------

/// Lifecycle state of an exploration session.
///
/// Transitions are `Active -> Recalled` or `Active -> Completed`. Both
/// `Recalled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ExplorationStatus {
    /// The dweller is out in the wasteland.
    Active,
    /// The player called the dweller back before the duration elapsed.
    Recalled,
    /// The full duration elapsed.
    Completed,
}

impl ExplorationStatus {
    /// Whether no further transitions are permitted from this state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Recalled | Self::Completed)
    }
}

impl core::fmt::Display for ExplorationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Recalled => "recalled",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Dweller attributes
// ---------------------------------------------------------------------------

/// One of the seven S.P.E.C.I.A.L. attributes of a dweller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Special {
    /// Raw physical power; improves odds in wasteland fights.
    Strength,
    /// Awareness; improves the chance of finding items.
    Perception,
    /// Stamina; lets a dweller cover more ground per hour.
    Endurance,
    /// Charm and leadership.
    Charisma,
    /// Learning ability; increases experience earned.
    Intelligence,
    /// Speed and dexterity.
    Agility,
    /// Fortune; raises caps found and the odds of rarer loot.
    Luck,
}

impl Special {
    /// Every attribute, in S.P.E.C.I.A.L. order.
    pub const ALL: [Self; 7] = [
        Self::Strength,
        Self::Perception,
        Self::Endurance,
        Self::Charisma,
        Self::Intelligence,
        Self::Agility,
        Self::Luck,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_rank_follows_ordering() {
        for pair in Rarity::ALL.windows(2) {
            if let [lower, higher] = pair {
                assert!(lower < higher);
                assert!(lower.rank() < higher.rank());
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!ExplorationStatus::Active.is_terminal());
        assert!(ExplorationStatus::Recalled.is_terminal());
        assert!(ExplorationStatus::Completed.is_terminal());
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&Rarity::Legendary).ok().as_deref(),
            Some("\"legendary\"")
        );
        assert_eq!(
            serde_json::to_string(&Special::Intelligence).ok().as_deref(),
            Some("\"intelligence\"")
        );
        let parsed: Result<ItemType, _> = serde_json::from_str("\"outfit\"");
        assert_eq!(parsed.ok(), Some(ItemType::Outfit));
    }
}
