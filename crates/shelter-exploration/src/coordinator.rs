//! The exploration coordinator: the only component that talks to the
//! collaborators.
//!
//! The coordinator owns every live session and drives it through its
//! lifecycle:
//!
//! 1. **Start** -- validate, reserve the dweller, flag them exploring,
//!    unassign them from their room, draw a seed.
//! 2. **Tick** -- roll encounters up to `now`, complete when due.
//! 3. **Recall** -- end early at the current fraction.
//! 4. **Finalize** -- generate rewards, place loot into storage under the
//!    vault's lock, credit caps and experience, bring the dweller home.
//!
//! Finalize records each write on the session as it lands. If a
//! collaborator fails part way, [`ExplorationCoordinator::retry_finalize`]
//! (or the next [`ExplorationCoordinator::tick_all`]) runs only the writes
//! still missing. The dweller stays reserved in the registry until they
//! are home, so the registry doubles as the index of open sessions.
//!
//! Locking: each session sits behind its own mutex and every status change
//! happens under it, so a tick and a recall racing on one session produce
//! exactly one finalize. Finalize takes the vault's storage lock while it
//! holds the session lock; no path takes them in the other order. The
//! registry, session-map, and summary locks are only held for map access.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use shelter_types::{
    DwellerId, ExplorationStatus, ProgressReport, RewardsSummary, SessionId, SpecialStats,
    VaultId,
};
use tracing::{debug, info, warn};

use crate::config::ExplorationConfig;
use crate::error::{ExplorationError, StoreError};
use crate::reward::{RewardBundle, RewardGenerator, RewardRequest};
use crate::rng::{self, SeedSource};
use crate::session::ExplorationSession;
use crate::storage::{self, Allocation};
use crate::store::{DwellerStore, StorageStore};

/// What a single tick did to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The session is still out; here is where it stands.
    InProgress(ProgressReport),
    /// The session completed on this tick and was finalized.
    Completed(RewardsSummary),
}

/// A session plus the attributes captured when it started.
#[derive(Debug)]
struct Entry {
    session: ExplorationSession,
    attributes: SpecialStats,
}

type SharedEntry = Arc<Mutex<Entry>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wrap a collaborator failure.
fn persistence(
    session_id: Option<SessionId>,
    operation: &'static str,
    source: StoreError,
) -> ExplorationError {
    ExplorationError::Persistence {
        session_id,
        operation,
        source,
    }
}

/// Owns exploration sessions and applies their outcomes to the vault.
pub struct ExplorationCoordinator {
    generator: RewardGenerator,
    dwellers: Arc<dyn DwellerStore>,
    storage: Arc<dyn StorageStore>,
    seeds: Arc<dyn SeedSource>,
    sessions: Mutex<BTreeMap<SessionId, SharedEntry>>,
    /// Open session per dweller, held from start until the dweller is home.
    registry: Mutex<BTreeMap<DwellerId, SessionId>>,
    vault_locks: Mutex<BTreeMap<VaultId, Arc<Mutex<()>>>>,
    summaries: Mutex<BTreeMap<SessionId, RewardsSummary>>,
}

impl std::fmt::Debug for ExplorationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationCoordinator")
            .field("sessions", &lock(&self.sessions).len())
            .field("active", &lock(&self.registry).len())
            .finish_non_exhaustive()
    }
}

impl ExplorationCoordinator {
    /// Create a coordinator over the given collaborators.
    pub const fn new(
        config: ExplorationConfig,
        dwellers: Arc<dyn DwellerStore>,
        storage: Arc<dyn StorageStore>,
        seeds: Arc<dyn SeedSource>,
    ) -> Self {
        Self {
            generator: RewardGenerator::new(config),
            dwellers,
            storage,
            seeds,
            sessions: Mutex::new(BTreeMap::new()),
            registry: Mutex::new(BTreeMap::new()),
            vault_locks: Mutex::new(BTreeMap::new()),
            summaries: Mutex::new(BTreeMap::new()),
        }
    }

    /// The balance table in use.
    pub const fn config(&self) -> &ExplorationConfig {
        self.generator.config()
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    /// Send a dweller into the wasteland for `duration_hours`.
    ///
    /// # Errors
    ///
    /// - [`ExplorationError::Validation`] for a disallowed duration, an
    ///   unknown dweller, or a dweller from another vault.
    /// - [`ExplorationError::Conflict`] if the dweller is already exploring.
    /// - [`ExplorationError::Persistence`] if a collaborator call fails; the
    ///   reservation is released, no session is created, and the dweller
    ///   keeps their room.
    pub fn start_exploration(
        &self,
        vault_id: VaultId,
        dweller_id: DwellerId,
        duration_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<SessionId, ExplorationError> {
        let dweller = match self.dwellers.get_dweller(dweller_id) {
            Ok(dweller) => dweller,
            Err(StoreError::DwellerNotFound(_)) => {
                return Err(ExplorationError::validation(format!(
                    "dweller {dweller_id} does not exist"
                )));
            }
            Err(source) => return Err(persistence(None, "get_dweller", source)),
        };
        if dweller.vault_id != vault_id {
            return Err(ExplorationError::validation(format!(
                "dweller {dweller_id} does not belong to vault {vault_id}"
            )));
        }

        let session = ExplorationSession::start(
            vault_id,
            dweller_id,
            duration_hours,
            now,
            self.seeds.next_seed(),
            self.config(),
        )?;
        let session_id = session.id();

        self.reserve(dweller_id, session_id)?;

        if let Err(err) = self.send_out(dweller_id, session_id) {
            lock(&self.registry).remove(&dweller_id);
            return Err(err);
        }

        lock(&self.sessions).insert(
            session_id,
            Arc::new(Mutex::new(Entry {
                session,
                attributes: dweller.special,
            })),
        );

        info!(
            session_id = %session_id,
            vault_id = %vault_id,
            dweller_id = %dweller_id,
            dweller = %dweller.name,
            duration_hours,
            "Dweller left for the wasteland"
        );
        Ok(session_id)
    }

    /// Claim the dweller for `session_id`, or report who already has them.
    fn reserve(&self, dweller_id: DwellerId, session_id: SessionId) -> Result<(), ExplorationError> {
        let mut registry = lock(&self.registry);
        if let Some(active) = registry.get(&dweller_id) {
            return Err(ExplorationError::Conflict {
                dweller_id,
                active_session: Some(*active),
            });
        }
        let exploring = self
            .dwellers
            .is_dweller_exploring(dweller_id)
            .map_err(|source| persistence(None, "is_dweller_exploring", source))?;
        if exploring {
            return Err(ExplorationError::Conflict {
                dweller_id,
                active_session: None,
            });
        }
        registry.insert(dweller_id, session_id);
        Ok(())
    }

    /// Flag the dweller exploring, then take them out of their room. The
    /// flag is cleared again if the room cannot be left.
    fn send_out(&self, dweller_id: DwellerId, session_id: SessionId) -> Result<(), ExplorationError> {
        self.dwellers
            .set_exploring(dweller_id, true)
            .map_err(|source| persistence(Some(session_id), "set_exploring", source))?;
        if let Err(source) = self.dwellers.unassign_from_room(dweller_id) {
            if let Err(err) = self.dwellers.set_exploring(dweller_id, false) {
                warn!(
                    session_id = %session_id,
                    dweller_id = %dweller_id,
                    error = %err,
                    "Exploring flag left set after failed start"
                );
            }
            return Err(persistence(Some(session_id), "unassign_from_room", source));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick / recall
    // -----------------------------------------------------------------------

    /// Advance a session to `now`.
    ///
    /// Rolls any encounters that became due, and if the duration has run
    /// out completes and finalizes the session. A `now` earlier than a
    /// previous tick is treated as that tick's instant.
    ///
    /// # Errors
    ///
    /// - [`ExplorationError::SessionNotFound`] for an unknown session.
    /// - [`ExplorationError::InvalidState`] if the session already ended.
    /// - [`ExplorationError::Persistence`] if finalize fails.
    pub fn tick(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ExplorationError> {
        let shared = self.entry(session_id)?;
        let mut entry = lock(&shared);
        self.advance(&mut entry, now)
    }

    fn advance(
        &self,
        entry: &mut Entry,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ExplorationError> {
        let session_id = entry.session.id();
        if entry.session.status() != ExplorationStatus::Active {
            return Err(ExplorationError::InvalidState {
                session_id,
                status: entry.session.status(),
            });
        }

        let now = entry.session.observe(now);
        let fraction = entry.session.elapsed_fraction(now);
        let bundle = self.roll(entry, fraction);
        let found = entry.session.absorb(&bundle)?;
        if found > 0 {
            debug!(session_id = %session_id, found, "New loot found");
        }

        if !entry.session.complete_if_due(now) {
            return Ok(TickOutcome::InProgress(entry.session.report(now)));
        }

        info!(session_id = %session_id, "Exploration completed");
        self.finalize(entry).map(TickOutcome::Completed)
    }

    /// Call a dweller back before the duration elapses and finalize.
    ///
    /// # Errors
    ///
    /// - [`ExplorationError::SessionNotFound`] for an unknown session.
    /// - [`ExplorationError::InvalidState`] if the session already ended;
    ///   nothing is written.
    /// - [`ExplorationError::Persistence`] if finalize fails; the session
    ///   stays recalled and [`retry_finalize`](Self::retry_finalize) picks
    ///   up where it stopped.
    pub fn recall_early(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<RewardsSummary, ExplorationError> {
        let shared = self.entry(session_id)?;
        let mut entry = lock(&shared);
        let fraction = entry.session.recall(now)?;
        info!(
            session_id = %session_id,
            progress = fraction * 100.0,
            "Dweller recalled"
        );
        self.finalize(&mut entry)
    }

    /// Finish a finalize that a collaborator failure interrupted.
    ///
    /// Only the writes that have not landed yet are made, so nothing is
    /// stored or credited twice.
    ///
    /// # Errors
    ///
    /// - [`ExplorationError::SessionNotFound`] for an unknown session.
    /// - [`ExplorationError::InvalidState`] if the session is still active
    ///   or already fully finalized.
    /// - [`ExplorationError::Persistence`] if a write fails again; the
    ///   writes that did land stay recorded.
    pub fn retry_finalize(
        &self,
        session_id: SessionId,
    ) -> Result<RewardsSummary, ExplorationError> {
        let shared = self.entry(session_id)?;
        let mut entry = lock(&shared);
        self.finalize(&mut entry)
    }

    /// Tick every open session, returning the summaries finalized by this
    /// sweep.
    ///
    /// Ended sessions with an interrupted finalize are resumed. Sessions
    /// that finished concurrently or are still starting are skipped.
    /// Collaborator failures are logged and do not stop the sweep.
    pub fn tick_all(&self, now: DateTime<Utc>) -> Vec<RewardsSummary> {
        let mut completed = Vec::new();
        for session_id in self.active_sessions() {
            match self.sweep(session_id, now) {
                Ok(TickOutcome::Completed(summary)) => completed.push(summary),
                Ok(TickOutcome::InProgress(_)) => {}
                Err(err) if err.is_invalid_state() => {
                    debug!(session_id = %session_id, "Session finalized before tick, skipped");
                }
                Err(ExplorationError::SessionNotFound(_)) => {
                    debug!(session_id = %session_id, "Session still starting, skipped");
                }
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "Tick failed");
                }
            }
        }
        completed
    }

    fn sweep(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ExplorationError> {
        let shared = self.entry(session_id)?;
        let mut entry = lock(&shared);
        if entry.session.status().is_terminal() {
            return self.finalize(&mut entry).map(TickOutcome::Completed);
        }
        self.advance(&mut entry, now)
    }

    fn roll(&self, entry: &Entry, fraction: f64) -> RewardBundle {
        let request = RewardRequest {
            elapsed_fraction: fraction,
            duration_hours: entry.session.duration_hours(),
            attributes: &entry.attributes,
        };
        self.generator
            .generate(&request, &mut rng::stream(entry.session.rng_seed()))
    }

    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    /// Apply a terminal session's outcome to the vault.
    ///
    /// Safe to call again after a failure: writes already recorded on the
    /// session are skipped. The registry entry is released only once the
    /// dweller is home.
    fn finalize(&self, entry: &mut Entry) -> Result<RewardsSummary, ExplorationError> {
        entry.session.check_finalizable()?;
        let ended_at = entry
            .session
            .ended_at()
            .unwrap_or(entry.session.start_time());
        let fraction = entry.session.reward_fraction(ended_at);
        let bundle = self.roll(entry, fraction);
        entry.session.absorb(&bundle)?;

        let session_id = entry.session.id();
        let resumed = entry.session.finalize_steps().is_started();
        if resumed {
            info!(session_id = %session_id, "Resuming interrupted finalize");
        }
        let allocation = match self.apply(&mut entry.session, &bundle) {
            Ok(allocation) => allocation,
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "Finalize interrupted");
                return Err(err);
            }
        };

        let session = &entry.session;
        let dweller_id = session.dweller_id();
        {
            let mut registry = lock(&self.registry);
            if registry.get(&dweller_id) == Some(&session_id) {
                registry.remove(&dweller_id);
            }
        }

        let summary = RewardsSummary {
            session_id,
            vault_id: session.vault_id(),
            dweller_id,
            experience: bundle.experience(),
            caps: bundle.caps(),
            distance: bundle.distance,
            enemies_defeated: bundle.enemies_defeated,
            events_encountered: bundle.events_encountered,
            items: allocation.transferred,
            overflow_items: allocation.overflow,
            recalled_early: session.status() == ExplorationStatus::Recalled
                && bundle.is_prorated(),
            progress_percentage: fraction * 100.0,
            final_used_space: allocation.final_used_space,
        };

        info!(
            session_id = %session_id,
            status = %session.status(),
            resumed,
            caps = summary.caps,
            experience = summary.experience,
            transferred = summary.items.len(),
            overflow = summary.overflow_items.len(),
            final_used_space = summary.final_used_space,
            "Exploration finalized"
        );

        lock(&self.summaries).insert(session_id, summary.clone());
        Ok(summary)
    }

    /// The collaborator writes of finalize, in order. Each is recorded on
    /// the session as it lands and skipped if already recorded.
    fn apply(
        &self,
        session: &mut ExplorationSession,
        bundle: &RewardBundle,
    ) -> Result<Allocation, ExplorationError> {
        let session_id = Some(session.id());
        let vault_id = session.vault_id();
        let dweller_id = session.dweller_id();

        if session.finalize_steps().allocation.is_none() {
            let vault_lock = self.vault_lock(vault_id);
            let _guard = lock(&vault_lock);

            let space = self
                .storage
                .get_space(vault_id)
                .map_err(|source| persistence(session_id, "get_space", source))?;
            let allocation =
                storage::allocate(bundle.loot.clone(), space.used_space, space.max_space);
            if !allocation.transferred.is_empty() {
                self.storage
                    .commit_items(vault_id, &allocation.transferred)
                    .map_err(|source| persistence(session_id, "commit_items", source))?;
            }
            session.record_allocation(allocation);
        }

        if !session.finalize_steps().caps_credited {
            self.dwellers
                .credit_caps(vault_id, bundle.caps())
                .map_err(|source| persistence(session_id, "credit_caps", source))?;
            session.record_caps_credited();
        }
        if !session.finalize_steps().experience_credited {
            self.dwellers
                .credit_experience(dweller_id, bundle.experience())
                .map_err(|source| persistence(session_id, "credit_experience", source))?;
            session.record_experience_credited();
        }
        if !session.finalize_steps().returned_home {
            self.dwellers
                .set_exploring(dweller_id, false)
                .map_err(|source| persistence(session_id, "set_exploring", source))?;
            session.record_returned_home();
        }

        Ok(session.finalize_steps().allocation.clone().unwrap_or_default())
    }

    fn vault_lock(&self, vault_id: VaultId) -> Arc<Mutex<()>> {
        Arc::clone(lock(&self.vault_locks).entry(vault_id).or_default())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn entry(&self, session_id: SessionId) -> Result<SharedEntry, ExplorationError> {
        lock(&self.sessions)
            .get(&session_id)
            .cloned()
            .ok_or(ExplorationError::SessionNotFound(session_id))
    }

    /// Where a session stands at `now`. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::SessionNotFound`] for an unknown session.
    pub fn get_progress(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<ProgressReport, ExplorationError> {
        let shared = self.entry(session_id)?;
        let entry = lock(&shared);
        Ok(entry.session.report(now))
    }

    /// Snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::SessionNotFound`] for an unknown session.
    pub fn session(&self, session_id: SessionId) -> Result<ExplorationSession, ExplorationError> {
        let shared = self.entry(session_id)?;
        let entry = lock(&shared);
        Ok(entry.session.clone())
    }

    /// IDs of every session whose dweller is not home yet: still out in
    /// the wasteland, or ended with an interrupted finalize.
    ///
    /// Read from the registry, so the cost tracks open sessions rather
    /// than every session ever started.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        lock(&self.registry).values().copied().collect()
    }

    /// The stored summary of a finalized session, if any.
    pub fn rewards(&self, session_id: SessionId) -> Option<RewardsSummary> {
        lock(&self.summaries).get(&session_id).cloned()
    }

    /// Remove and return the stored summary of a finalized session.
    pub fn take_rewards(&self, session_id: SessionId) -> Option<RewardsSummary> {
        lock(&self.summaries).remove(&session_id)
    }
}
