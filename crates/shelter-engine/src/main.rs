//! Driver binary for Shelter wasteland exploration.
//!
//! Wires the exploration coordinator to an in-memory vault and a tick
//! scheduler on a simulated clock, sends the configured roster out, and
//! runs until everyone is home.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `shelter-config.yaml` (or `SHELTER_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Seed the in-memory vault from the `vault` roster
//! 4. Pick the seed source (fixed seed or entropy)
//! 5. Send every rostered dweller out
//! 6. Run the scheduler until done, the tick limit, or Ctrl-C
//! 7. Log the results

mod error;
mod roster;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use shelter_exploration::config::LoggingConfig;
use shelter_exploration::{
    DwellerStore, EntropySeedSource, ExplorationCoordinator, FixedSeedSource, InMemoryVault,
    SeedSource, ShelterConfig, StorageStore,
};
use shelter_types::RewardsSummary;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::roster::RosterConfig;
use crate::scheduler::{PlannedRecall, Scheduler, SimClock};

/// Environment variable naming an alternative config file.
const CONFIG_ENV_VAR: &str = "SHELTER_CONFIG";

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "shelter-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, roster seeding, or starting an
/// expedition fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        seed = ?config.rng.seed,
        tick_interval_ms = config.scheduler.tick_interval_ms,
        sim_seconds_per_tick = config.scheduler.sim_seconds_per_tick,
        "shelter-engine starting"
    );

    // 3. Seed the vault.
    let roster = RosterConfig::from_file(&config_path)?;
    let store = Arc::new(InMemoryVault::new());
    let (vault_id, crew) = roster.populate(&store)?;
    info!(
        vault_id = %vault_id,
        max_space = roster.max_space,
        used_space = roster.used_space,
        dwellers = crew.len(),
        "Vault seeded"
    );

    // 4. Seed source.
    let seeds: Arc<dyn SeedSource> = match config.rng.seed {
        Some(seed) => Arc::new(FixedSeedSource::new(seed)),
        None => Arc::new(EntropySeedSource),
    };

    let coordinator = Arc::new(ExplorationCoordinator::new(
        config.exploration,
        Arc::clone(&store) as Arc<dyn DwellerStore>,
        Arc::clone(&store) as Arc<dyn StorageStore>,
        seeds,
    ));

    // 5. Send the crew out.
    let clock = SimClock::new(Utc::now(), config.scheduler.sim_seconds_per_tick);
    let start = clock.now();
    let mut recalls = Vec::new();
    for (dweller_id, plan) in crew {
        let session_id =
            coordinator.start_exploration(vault_id, dweller_id, plan.duration_hours, start)?;
        if let Some(hours) = plan.recall_after_hours {
            recalls.push(PlannedRecall {
                session_id,
                at: start + Duration::hours(i64::from(hours)),
            });
        }
    }

    // 6. Run.
    let scheduler = Scheduler::new(
        Arc::clone(&coordinator),
        config.scheduler,
        clock,
        recalls,
    );
    let result = scheduler.run(shutdown_signal()).await;

    // 7. Report.
    for summary in &result.summaries {
        log_summary(summary);
    }
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        finalized = result.summaries.len(),
        still_out = coordinator.active_sessions().len(),
        vault_caps = store.vault_caps(vault_id).unwrap_or(0),
        stored_items = store.stored_items(vault_id).len(),
        "shelter-engine shutdown complete"
    );

    Ok(())
}

/// `SHELTER_CONFIG` if set, otherwise `shelter-config.yaml`.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the configuration, falling back to defaults if the file is absent.
fn load_config(path: &std::path::Path) -> Result<ShelterConfig, EngineError> {
    if path.exists() {
        Ok(ShelterConfig::from_file(path)?)
    } else {
        Ok(ShelterConfig::parse("")?)
    }
}

/// `RUST_LOG` wins; otherwise the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn log_summary(summary: &RewardsSummary) {
    info!(
        session_id = %summary.session_id,
        dweller_id = %summary.dweller_id,
        recalled_early = summary.recalled_early,
        progress = summary.progress_percentage,
        caps = summary.caps,
        experience = summary.experience,
        distance = summary.distance,
        enemies_defeated = summary.enemies_defeated,
        events = summary.events_encountered,
        items = summary.items.len(),
        overflow = summary.overflow_items.len(),
        final_used_space = summary.final_used_space,
        "Expedition summary"
    );
}
