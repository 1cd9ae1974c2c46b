//! The exploration session state machine.
//!
//! A session is one dweller's timed expedition. It starts `Active` and ends
//! exactly once, either `Recalled` by the player or `Completed` when the
//! duration runs out:
//!
//! ```text
//!            recall(now)
//!   Active ---------------> Recalled
//!      |
//!      +------------------> Completed
//!        complete_if_due(now)
//! ```
//!
//! Both exits go through [`ExplorationSession::transition`], the single
//! compare-and-set on the status field. Whoever holds the session's lock
//! and sees `Active` wins; everyone after observes a terminal status and
//! gets [`ExplorationError::InvalidState`].
//!
//! Time is always a parameter. Nothing here reads the wall clock. The
//! session remembers the latest instant it was shown and never moves back
//! before it, so a caller with a lagging clock cannot rewind an expedition.
//!
//! Finalize is a sequence of collaborator writes. Each one is recorded in
//! [`FinalizeSteps`] as it lands, and the session counts as finalized only
//! once all of them have.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelter_types::{
    DwellerId, ExplorationStatus, LootItem, ProgressReport, SessionId, VaultId,
};

use crate::config::ExplorationConfig;
use crate::error::ExplorationError;
use crate::reward::{RewardBundle, clamp_fraction};
use crate::storage::Allocation;

/// Milliseconds in one hour.
const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Finalize writes that have landed for a terminal session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSteps {
    /// Storage placement, once committed.
    pub allocation: Option<Allocation>,
    /// Caps added to the vault treasury.
    pub caps_credited: bool,
    /// Experience added to the dweller.
    pub experience_credited: bool,
    /// Exploring flag cleared.
    pub returned_home: bool,
}

impl FinalizeSteps {
    /// Whether every write has landed.
    pub const fn is_complete(&self) -> bool {
        self.allocation.is_some()
            && self.caps_credited
            && self.experience_credited
            && self.returned_home
    }

    /// Whether any write has landed.
    pub const fn is_started(&self) -> bool {
        self.allocation.is_some()
            || self.caps_credited
            || self.experience_credited
            || self.returned_home
    }
}

/// One dweller's expedition into the wasteland.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSession {
    id: SessionId,
    vault_id: VaultId,
    dweller_id: DwellerId,
    start_time: DateTime<Utc>,
    duration_hours: u32,
    status: ExplorationStatus,
    /// Bumped on every status transition.
    version: u64,
    rng_seed: u64,
    /// Elapsed fraction captured by `recall`.
    recalled_fraction: Option<f64>,
    ended_at: Option<DateTime<Utc>>,
    /// Latest instant passed in while active.
    last_observed: DateTime<Utc>,
    finalize_steps: FinalizeSteps,
    encounters_rolled: u32,
    total_distance: u64,
    total_caps_found: u64,
    enemies_defeated: u32,
    events_encountered: u32,
    loot_collected: Vec<LootItem>,
}

impl ExplorationSession {
    /// Begin a new expedition at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::Validation`] if `duration_hours` is not
    /// one of the configured durations.
    pub fn start(
        vault_id: VaultId,
        dweller_id: DwellerId,
        duration_hours: u32,
        now: DateTime<Utc>,
        rng_seed: u64,
        config: &ExplorationConfig,
    ) -> Result<Self, ExplorationError> {
        if !config.is_allowed_duration(duration_hours) {
            return Err(ExplorationError::validation(format!(
                "duration of {duration_hours}h is not one of {:?}",
                config.allowed_durations_hours
            )));
        }

        Ok(Self {
            id: SessionId::new(),
            vault_id,
            dweller_id,
            start_time: now,
            duration_hours,
            status: ExplorationStatus::Active,
            version: 0,
            rng_seed,
            recalled_fraction: None,
            ended_at: None,
            last_observed: now,
            finalize_steps: FinalizeSteps::default(),
            encounters_rolled: 0,
            total_distance: 0,
            total_caps_found: 0,
            enemies_defeated: 0,
            events_encountered: 0,
            loot_collected: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Session identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The vault the dweller belongs to.
    pub const fn vault_id(&self) -> VaultId {
        self.vault_id
    }

    /// The dweller out exploring.
    pub const fn dweller_id(&self) -> DwellerId {
        self.dweller_id
    }

    /// When the expedition began.
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Length of the expedition in hours.
    pub const fn duration_hours(&self) -> u32 {
        self.duration_hours
    }

    /// Current lifecycle state.
    pub const fn status(&self) -> ExplorationStatus {
        self.status
    }

    /// Optimistic-concurrency stamp; changes on every transition.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Seed of the session's reward stream.
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    /// When the session left `Active`, if it has.
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether every finalize write has landed.
    pub const fn is_finalized(&self) -> bool {
        self.finalize_steps.is_complete()
    }

    /// Finalize writes recorded so far.
    pub const fn finalize_steps(&self) -> &FinalizeSteps {
        &self.finalize_steps
    }

    /// Encounter ticks resolved so far.
    pub const fn encounters_rolled(&self) -> u32 {
        self.encounters_rolled
    }

    /// Distance covered so far.
    pub const fn total_distance(&self) -> u64 {
        self.total_distance
    }

    /// Caps found so far (continuous and stashes).
    pub const fn total_caps_found(&self) -> u64 {
        self.total_caps_found
    }

    /// Enemies defeated so far.
    pub const fn enemies_defeated(&self) -> u32 {
        self.enemies_defeated
    }

    /// Non-empty encounters so far.
    pub const fn events_encountered(&self) -> u32 {
        self.events_encountered
    }

    /// Loot found so far, in discovery order.
    pub fn loot_collected(&self) -> &[LootItem] {
        &self.loot_collected
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Full duration in milliseconds (at least 1).
    fn duration_millis(&self) -> i64 {
        i64::from(self.duration_hours)
            .saturating_mul(MILLIS_PER_HOUR)
            .max(1)
    }

    /// The instant time stops counting for this session.
    fn effective_now(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.ended_at.unwrap_or(now)
    }

    /// `now`, or the latest instant already seen if `now` is earlier.
    ///
    /// Recorded while the session is active.
    pub fn observe(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.max(self.last_observed);
        if self.status == ExplorationStatus::Active {
            self.last_observed = now;
        }
        now
    }

    /// Whole seconds elapsed since start, never negative.
    ///
    /// Frozen at the end time once the session is terminal, and never more
    /// than the full duration for a completed session.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let millis = self.elapsed_millis(now);
        let millis = if self.status == ExplorationStatus::Completed {
            millis.min(self.duration_millis())
        } else {
            millis
        };
        millis.checked_div(1000).unwrap_or(0)
    }

    fn elapsed_millis(&self, now: DateTime<Utc>) -> i64 {
        (self.effective_now(now) - self.start_time)
            .num_milliseconds()
            .max(0)
    }

    /// `min(1.0, elapsed / duration)` at `now`, ignoring status.
    pub fn elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.elapsed_millis(now) as f64 / self.duration_millis() as f64;
        clamp_fraction(fraction)
    }

    /// Progress percentage, `0.0..=100.0`.
    ///
    /// Pure: callable at any time. A completed session reads 100, a
    /// recalled one reads the value captured at recall.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        self.reward_fraction(now) * 100.0
    }

    /// The fraction rewards are computed for: the live fraction while
    /// active, the captured one after recall, 1.0 after completion.
    pub fn reward_fraction(&self, now: DateTime<Utc>) -> f64 {
        match self.status {
            ExplorationStatus::Active => self.elapsed_fraction(now),
            ExplorationStatus::Recalled => clamp_fraction(self.recalled_fraction.unwrap_or(0.0)),
            ExplorationStatus::Completed => 1.0,
        }
    }

    /// Whether the full duration has elapsed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_fraction(now) >= 1.0
    }

    /// Point-in-time view for callers.
    pub fn report(&self, now: DateTime<Utc>) -> ProgressReport {
        ProgressReport {
            session_id: self.id,
            status: self.status,
            progress_percentage: self.progress(now),
            elapsed_seconds: self.elapsed_seconds(now),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Move from `from` to `to`, failing unless the current status is `from`.
    ///
    /// The only way the status ever changes. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::InvalidState`] if the status is not `from`
    /// or the move is not `Active -> terminal`. State is untouched on error.
    pub fn transition(
        &mut self,
        from: ExplorationStatus,
        to: ExplorationStatus,
        now: DateTime<Utc>,
    ) -> Result<u64, ExplorationError> {
        let legal = from == ExplorationStatus::Active && to.is_terminal();
        if self.status != from || !legal {
            return Err(self.invalid_state());
        }
        self.status = to;
        self.version = self.version.saturating_add(1);
        self.ended_at = Some(now.max(self.start_time));
        Ok(self.version)
    }

    /// Call the dweller back early.
    ///
    /// Returns the elapsed fraction captured for prorated rewards. A `now`
    /// earlier than the latest tick counts as that tick's instant, so loot
    /// already rolled is always covered by the captured fraction.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::InvalidState`] if the session already
    /// ended (recalled twice, or completed first).
    pub fn recall(&mut self, now: DateTime<Utc>) -> Result<f64, ExplorationError> {
        let now = now.max(self.last_observed);
        let fraction = self.elapsed_fraction(now);
        self.transition(ExplorationStatus::Active, ExplorationStatus::Recalled, now)?;
        self.recalled_fraction = Some(fraction);
        self.last_observed = now;
        Ok(fraction)
    }

    /// Complete the session if it is active and its time is up.
    ///
    /// Returns whether this call performed the transition.
    pub fn complete_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ExplorationStatus::Active || !self.is_due(now) {
            return false;
        }
        self.transition(ExplorationStatus::Active, ExplorationStatus::Completed, now)
            .is_ok()
    }

    /// Check that finalize may run: the session has ended and some write
    /// is still missing.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::InvalidState`] if the session is still
    /// active or fully finalized.
    pub fn check_finalizable(&self) -> Result<(), ExplorationError> {
        if !self.status.is_terminal() || self.is_finalized() {
            return Err(self.invalid_state());
        }
        Ok(())
    }

    /// Record the committed storage placement.
    pub fn record_allocation(&mut self, allocation: Allocation) {
        self.finalize_steps.allocation = Some(allocation);
    }

    /// Record that caps reached the vault.
    pub const fn record_caps_credited(&mut self) {
        self.finalize_steps.caps_credited = true;
    }

    /// Record that experience reached the dweller.
    pub const fn record_experience_credited(&mut self) {
        self.finalize_steps.experience_credited = true;
    }

    /// Record that the dweller is no longer flagged exploring.
    pub const fn record_returned_home(&mut self) {
        self.finalize_steps.returned_home = true;
    }

    /// Fold a freshly generated bundle into the running tallies.
    ///
    /// `bundle` must come from this session's seed. Because encounters are
    /// prefix-stable, loot already recorded is a prefix of `bundle.loot`;
    /// only items past that prefix are appended. Returns how many items
    /// were appended.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorationError::InvalidState`] once the session has been
    /// finalized.
    pub fn absorb(&mut self, bundle: &RewardBundle) -> Result<usize, ExplorationError> {
        if self.is_finalized() {
            return Err(self.invalid_state());
        }
        let known = self.loot_collected.len();
        let fresh = bundle.loot.get(known..).unwrap_or_default();
        self.loot_collected.extend_from_slice(fresh);

        self.encounters_rolled = self.encounters_rolled.max(bundle.encounters_rolled);
        self.total_distance = bundle.distance;
        self.total_caps_found = bundle.caps();
        self.enemies_defeated = bundle.enemies_defeated;
        self.events_encountered = bundle.events_encountered;
        Ok(fresh.len())
    }

    fn invalid_state(&self) -> ExplorationError {
        ExplorationError::InvalidState {
            session_id: self.id,
            status: self.status,
        }
    }
}
