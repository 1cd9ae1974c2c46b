//! Shared type definitions for the Shelter wasteland exploration engine.
//!
//! This crate is the single source of truth for the value types that cross
//! the boundary between the exploration core and its callers. Types flow
//! downstream to `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for vaults, dwellers, rooms, sessions
//! - [`enums`] -- Item types, rarity tiers, session status, S.P.E.C.I.A.L.
//! - [`structs`] -- Loot, dweller records, storage space, engine outputs

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ExplorationStatus, ItemType, Rarity, Special};
pub use ids::{DwellerId, RoomId, SessionId, VaultId};
pub use structs::{
    Dweller, LootItem, ProgressReport, RewardsSummary, SpecialStats, StorageSpace,
};
