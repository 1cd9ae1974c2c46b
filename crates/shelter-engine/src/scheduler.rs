//! Tick scheduler driving the exploration coordinator.
//!
//! The coordinator never reads the clock, so the scheduler owns a
//! [`SimClock`] that jumps `sim_seconds_per_tick` forward on every real
//! `tick_interval_ms`. Each tick it:
//!
//! 1. advances the simulated clock,
//! 2. recalls dwellers whose planned recall time has come,
//! 3. calls `tick_all` so due sessions complete and finalize.
//!
//! The run ends when no session is active, after `max_ticks`, or when the
//! shutdown future resolves (Ctrl-C in the binary).

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use shelter_exploration::config::SchedulerConfig;
use shelter_exploration::ExplorationCoordinator;
use shelter_types::{RewardsSummary, SessionId};
use tracing::{debug, info, warn};

/// Simulated wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    now: DateTime<Utc>,
    step: Duration,
}

impl SimClock {
    /// Start at `now`, moving `step_seconds` per advance.
    pub fn new(now: DateTime<Utc>, step_seconds: u64) -> Self {
        let seconds = i64::try_from(step_seconds).unwrap_or(i64::MAX);
        Self {
            now,
            step: Duration::try_seconds(seconds).unwrap_or(Duration::MAX),
        }
    }

    /// Current simulated time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move forward one step and return the new time.
    pub fn advance(&mut self) -> DateTime<Utc> {
        self.now = self.now.checked_add_signed(self.step).unwrap_or(self.now);
        self.now
    }
}

/// A recall planned for a simulated instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedRecall {
    /// Session to recall.
    pub session_id: SessionId,
    /// When to recall it.
    pub at: DateTime<Utc>,
}

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every dweller is back home.
    AllReturned,
    /// `max_ticks` ticks ran.
    TickLimit,
    /// The shutdown signal fired.
    Shutdown,
}

/// Outcome of a scheduler run.
#[derive(Debug)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: EndReason,
    /// Scheduler ticks executed.
    pub total_ticks: u64,
    /// Every summary produced, in finalize order.
    pub summaries: Vec<RewardsSummary>,
}

/// Drives a coordinator on a fixed real-time interval.
pub struct Scheduler {
    coordinator: Arc<ExplorationCoordinator>,
    config: SchedulerConfig,
    clock: SimClock,
    recalls: Vec<PlannedRecall>,
}

impl Scheduler {
    /// Create a scheduler starting at `clock`.
    pub const fn new(
        coordinator: Arc<ExplorationCoordinator>,
        config: SchedulerConfig,
        clock: SimClock,
        recalls: Vec<PlannedRecall>,
    ) -> Self {
        Self {
            coordinator,
            config,
            clock,
            recalls,
        }
    }

    /// Run until every session ends, the tick limit, or `shutdown`.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> RunResult {
        let period = std::time::Duration::from_millis(self.config.tick_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut total_ticks: u64 = 0;
        let mut summaries = Vec::new();

        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            sim_seconds_per_tick = self.config.sim_seconds_per_tick,
            max_ticks = self.config.max_ticks,
            planned_recalls = self.recalls.len(),
            "Scheduler starting"
        );

        let end_reason = loop {
            if self.coordinator.active_sessions().is_empty() {
                break EndReason::AllReturned;
            }
            if self.config.max_ticks > 0 && total_ticks >= self.config.max_ticks {
                info!(max_ticks = self.config.max_ticks, "Tick limit reached");
                break EndReason::TickLimit;
            }

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break EndReason::Shutdown;
                }
                _ = interval.tick() => {}
            }

            let now = self.clock.advance();
            total_ticks = total_ticks.saturating_add(1);
            summaries.extend(self.recall_due(now));
            summaries.extend(self.coordinator.tick_all(now));
            debug!(tick = total_ticks, sim_time = %now, "Scheduler tick");
        };

        RunResult {
            end_reason,
            total_ticks,
            summaries,
        }
    }

    /// Fire every planned recall whose time has come.
    fn recall_due(&mut self, now: DateTime<Utc>) -> Vec<RewardsSummary> {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.recalls.drain(..).partition(|recall| recall.at <= now);
        self.recalls = pending;

        due.into_iter()
            .filter_map(|recall| match self.coordinator.recall_early(recall.session_id, now) {
                Ok(summary) => Some(summary),
                Err(err) if err.is_invalid_state() => {
                    debug!(session_id = %recall.session_id, "Session ended before recall");
                    None
                }
                Err(err) => {
                    warn!(session_id = %recall.session_id, error = %err, "Recall failed");
                    None
                }
            })
            .collect()
    }
}
