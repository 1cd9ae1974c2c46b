//! Wasteland exploration engine for the Shelter vault simulation.
//!
//! A dweller leaves the vault for a fixed number of hours. While they are
//! out, encounters are rolled from a per-session seeded stream; when the
//! time runs out (or the player recalls them early) the haul is placed into
//! vault storage, legendary items first, and caps and experience are
//! credited.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and the reward balance table
//! - [`error`] -- Engine and collaborator error types
//! - [`rng`] -- Seed sources and per-session random streams
//! - [`reward`] -- Deterministic reward generation
//! - [`storage`] -- Rarity-priority storage allocation
//! - [`session`] -- The exploration session state machine
//! - [`store`] -- Collaborator traits for dwellers, vaults, and storage
//! - [`memory`] -- In-memory collaborators with failure injection
//! - [`coordinator`] -- Session ownership, ticking, and finalize
//!
//! The core is synchronous and never reads the clock: every time-dependent
//! operation takes `now` as a parameter, and a driver decides when to call
//! [`ExplorationCoordinator::tick_all`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod reward;
pub mod rng;
pub mod session;
pub mod storage;
pub mod store;

pub use config::{ConfigError, ExplorationConfig, ShelterConfig};
pub use coordinator::{ExplorationCoordinator, TickOutcome};
pub use error::{ExplorationError, StoreError};
pub use memory::{FailPoint, InMemoryVault};
pub use reward::{RewardBundle, RewardGenerator, RewardRequest};
pub use rng::{EntropySeedSource, FixedSeedSource, SeedSource};
pub use session::{ExplorationSession, FinalizeSteps};
pub use storage::{Allocation, allocate};
pub use store::{DwellerStore, StorageStore};
