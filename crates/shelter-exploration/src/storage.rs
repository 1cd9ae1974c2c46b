//! Rarity-priority placement of loot into vault storage.
//!
//! [`allocate`] is a pure decision function: it works on values only and
//! never writes anywhere. The coordinator commits the transferred items and
//! reports the overflow.
//!
//! Placement rule: sort descending by rarity (legendary first) with a stable
//! sort, so items of equal rarity keep the order they were found in, then
//! fill free slots one item per slot. Everything after the last free slot
//! overflows regardless of rarity.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use shelter_types::LootItem;

/// Result of placing loot into storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Allocation {
    /// Items accepted into storage, highest rarity first.
    pub transferred: Vec<LootItem>,
    /// Items that did not fit.
    pub overflow: Vec<LootItem>,
    /// Storage usage after accepting `transferred`.
    pub final_used_space: u32,
}

impl Allocation {
    /// Number of items that did not fit.
    pub const fn overflow_count(&self) -> usize {
        self.overflow.len()
    }
}

/// Decide which loot items fit into storage.
///
/// Guarantees, for consistent input (`used_space <= max_space`):
/// `final_used_space <= max_space` and
/// `transferred.len() + overflow.len() == loot.len()`. If the input is
/// already over-committed nothing is accepted and `final_used_space`
/// equals `used_space`.
pub fn allocate(mut loot: Vec<LootItem>, used_space: u32, max_space: u32) -> Allocation {
    // `sort_by_key` is stable: equal rarities keep their discovery order.
    loot.sort_by_key(|item| Reverse(item.rarity));

    let free = usize::try_from(max_space.saturating_sub(used_space)).unwrap_or(usize::MAX);
    let accepted = free.min(loot.len());
    let overflow = loot.split_off(accepted);

    let accepted_slots = u32::try_from(accepted).unwrap_or(u32::MAX);
    Allocation {
        final_used_space: used_space.saturating_add(accepted_slots),
        transferred: loot,
        overflow,
    }
}
