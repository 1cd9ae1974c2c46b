//! Error types for the exploration engine.
//!
//! All operations return typed errors rather than panicking. Every error is
//! a value the caller can inspect; nothing here is fatal to the process and
//! the engine never retries on the caller's behalf.

use shelter_types::{DwellerId, ExplorationStatus, SessionId, VaultId};

/// Errors surfaced by the exploration engine.
#[derive(Debug, thiserror::Error)]
pub enum ExplorationError {
    /// The request was rejected before any state changed.
    #[error("validation failed: {reason}")]
    Validation {
        /// Description of why the request was rejected.
        reason: String,
    },

    /// The session is not in a state that permits the operation.
    ///
    /// Harmless: redundant recalls and ticks on a finished session land
    /// here. Re-query the session to see its current state.
    #[error("session {session_id} is {status}, operation not permitted")]
    InvalidState {
        /// The session that was operated on.
        session_id: SessionId,
        /// The status observed when the operation was attempted.
        status: ExplorationStatus,
    },

    /// The dweller is already out exploring.
    #[error("dweller {dweller_id} is already exploring")]
    Conflict {
        /// The dweller that was asked to start a second expedition.
        dweller_id: DwellerId,
        /// The session currently owning the dweller, when known.
        active_session: Option<SessionId>,
    },

    /// A collaborator failed while the engine was writing through it.
    #[error("persistence failed during {operation}: {source}")]
    Persistence {
        /// The session being processed, if one exists yet.
        session_id: Option<SessionId>,
        /// The collaborator call that failed.
        operation: &'static str,
        /// The underlying collaborator error.
        source: StoreError,
    },

    /// No session with the given ID is known to the coordinator.
    #[error("exploration session not found: {0}")]
    SessionNotFound(SessionId),
}

impl ExplorationError {
    /// Build a [`ExplorationError::Validation`] from a message.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Whether this error only reports a stale view of a session.
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

/// Errors reported by the dweller/vault and storage collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The dweller does not exist.
    #[error("dweller not found: {0}")]
    DwellerNotFound(DwellerId),

    /// The vault does not exist.
    #[error("vault not found: {0}")]
    VaultNotFound(VaultId),

    /// Committing items would push storage past its capacity.
    #[error(
        "storage capacity exceeded in vault {vault_id}: {requested} items, {free} free slots"
    )]
    CapacityExceeded {
        /// The vault whose storage was targeted.
        vault_id: VaultId,
        /// Number of items the caller tried to commit.
        requested: u32,
        /// Free slots at the time of the call.
        free: u32,
    },

    /// The backing store could not complete the request.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}
