//! Error types for the engine binary.

use shelter_exploration::{ConfigError, ExplorationError, StoreError};

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// An exploration operation failed.
    #[error("exploration error: {source}")]
    Exploration {
        /// The underlying exploration error.
        #[from]
        source: ExplorationError,
    },

    /// Seeding the in-memory vault failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The `vault` roster section could not be read.
    #[error("roster error: {message}")]
    Roster {
        /// Description of the roster failure.
        message: String,
    },
}
