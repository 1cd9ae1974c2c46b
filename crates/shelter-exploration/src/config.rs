//! Configuration loading and typed config structures for the exploration engine.
//!
//! The canonical configuration lives in `shelter-config.yaml` at the project
//! root. Reward accrual rates, encounter tables, and the luck-to-rarity curve
//! are all data here, so balance changes never touch the algorithms.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use shelter_types::{ItemType, Rarity};

/// Environment variable that overrides `rng.seed`.
pub const SEED_ENV_VAR: &str = "SHELTER_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable game balance.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `shelter-config.yaml`. Every field has a
/// default, so an empty file yields a playable configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShelterConfig {
    /// Exploration balance: durations, rates, encounter and loot tables.
    #[serde(default)]
    pub exploration: ExplorationConfig,

    /// Driver settings for the tick scheduler.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Random seed settings.
    #[serde(default)]
    pub rng: RngConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ShelterConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `SHELTER_SEED` overrides `rng.seed` when set to a valid `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the exploration tables are unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.rng.apply_env_overrides();
        config.exploration.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Exploration
// ---------------------------------------------------------------------------

/// Balance parameters for wasteland exploration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExplorationConfig {
    /// Durations (in hours) a player may pick when sending a dweller out.
    #[serde(default = "default_allowed_durations_hours")]
    pub allowed_durations_hours: Vec<u32>,

    /// Encounter rolls per simulated hour.
    #[serde(default = "default_encounters_per_hour")]
    pub encounters_per_hour: u32,

    /// Continuous per-hour accrual rates.
    #[serde(default)]
    pub rates: AccrualRates,

    /// Weighted outcome table rolled once per encounter.
    #[serde(default)]
    pub encounters: EncounterWeights,

    /// Smallest caps stash an encounter can turn up.
    #[serde(default = "default_caps_find_min")]
    pub caps_find_min: u64,

    /// Largest caps stash an encounter can turn up.
    #[serde(default = "default_caps_find_max")]
    pub caps_find_max: u64,

    /// Enemy encounter parameters.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Rarity weights and the luck curve.
    #[serde(default)]
    pub rarity: RarityConfig,

    /// Relative weight of each item type on an item find.
    #[serde(default = "default_item_type_weights")]
    pub item_type_weights: BTreeMap<ItemType, u32>,

    /// Base caps value of an item per rarity tier.
    #[serde(default = "default_item_values")]
    pub item_values: BTreeMap<Rarity, u64>,

    /// Maximum percentage an item's value deviates from its tier base.
    #[serde(default = "default_value_spread_pct")]
    pub value_spread_pct: u32,

    /// Per-point attribute bonuses.
    #[serde(default)]
    pub stat_bonuses: StatBonuses,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            allowed_durations_hours: default_allowed_durations_hours(),
            encounters_per_hour: default_encounters_per_hour(),
            rates: AccrualRates::default(),
            encounters: EncounterWeights::default(),
            caps_find_min: default_caps_find_min(),
            caps_find_max: default_caps_find_max(),
            combat: CombatConfig::default(),
            rarity: RarityConfig::default(),
            item_type_weights: default_item_type_weights(),
            item_values: default_item_values(),
            value_spread_pct: default_value_spread_pct(),
            stat_bonuses: StatBonuses::default(),
        }
    }
}

impl ExplorationConfig {
    /// Whether `hours` is one of the allowed expedition lengths.
    pub fn is_allowed_duration(&self, hours: u32) -> bool {
        self.allowed_durations_hours.contains(&hours)
    }

    /// Check that the tables describe a usable balance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_durations_hours.is_empty() {
            return Err(invalid("allowed_durations_hours must not be empty"));
        }
        if self.allowed_durations_hours.contains(&0) {
            return Err(invalid("allowed_durations_hours must not contain 0"));
        }
        if self.encounters.total() == 0 {
            return Err(invalid("encounter weights must not all be zero"));
        }
        if self.rarity.base_weights.values().all(|w| *w == 0) {
            return Err(invalid("rarity base_weights must not all be zero"));
        }
        if self.item_type_weights.values().all(|w| *w == 0) {
            return Err(invalid("item_type_weights must not all be zero"));
        }
        if self.caps_find_min > self.caps_find_max {
            return Err(invalid("caps_find_min must not exceed caps_find_max"));
        }
        if self.combat.max_win_pct > 100 || self.combat.base_win_pct > 100 {
            return Err(invalid("combat win percentages must be within 0..=100"));
        }
        if self.rarity.common_floor_pct > 100 {
            return Err(invalid("rarity common_floor_pct must be within 0..=100"));
        }
        if self.value_spread_pct > 100 {
            return Err(invalid("value_spread_pct must be within 0..=100"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Continuous rewards accrued per simulated hour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualRates {
    /// Caps scavenged per hour.
    #[serde(default = "default_caps_per_hour")]
    pub caps_per_hour: u64,

    /// Experience earned per hour.
    #[serde(default = "default_experience_per_hour")]
    pub experience_per_hour: u64,

    /// Distance covered per hour.
    #[serde(default = "default_distance_per_hour")]
    pub distance_per_hour: u64,
}

impl Default for AccrualRates {
    fn default() -> Self {
        Self {
            caps_per_hour: default_caps_per_hour(),
            experience_per_hour: default_experience_per_hour(),
            distance_per_hour: default_distance_per_hour(),
        }
    }
}

/// Relative weights of the encounter outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncounterWeights {
    /// Nothing of note happens.
    #[serde(default = "default_weight_nothing")]
    pub nothing: u32,

    /// A stash of caps.
    #[serde(default = "default_weight_caps")]
    pub caps: u32,

    /// A hostile creature or raider.
    #[serde(default = "default_weight_enemy")]
    pub enemy: u32,

    /// An item find (boosted by perception).
    #[serde(default = "default_weight_item")]
    pub item: u32,
}

impl EncounterWeights {
    /// Sum of all weights, saturating.
    pub const fn total(&self) -> u32 {
        self.nothing
            .saturating_add(self.caps)
            .saturating_add(self.enemy)
            .saturating_add(self.item)
    }
}

impl Default for EncounterWeights {
    fn default() -> Self {
        Self {
            nothing: default_weight_nothing(),
            caps: default_weight_caps(),
            enemy: default_weight_enemy(),
            item: default_weight_item(),
        }
    }
}

/// Enemy encounter parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CombatConfig {
    /// Win chance (percent) of a dweller with zero strength.
    #[serde(default = "default_base_win_pct")]
    pub base_win_pct: u32,

    /// Win chance added per strength point.
    #[serde(default = "default_strength_bonus_pct")]
    pub strength_bonus_pct: u32,

    /// Upper bound on the win chance.
    #[serde(default = "default_max_win_pct")]
    pub max_win_pct: u32,

    /// Experience awarded per defeated enemy.
    #[serde(default = "default_experience_per_kill")]
    pub experience_per_kill: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_win_pct: default_base_win_pct(),
            strength_bonus_pct: default_strength_bonus_pct(),
            max_win_pct: default_max_win_pct(),
            experience_per_kill: default_experience_per_kill(),
        }
    }
}

/// Rarity weights and how luck bends them.
///
/// For luck `L`, a tier of rank `r > 0` has weight
/// `base * (100 + L * luck_bonus_pct * r) / 100`, while common has weight
/// `base * max(common_floor_pct, 100 - L * common_penalty_pct) / 100`.
/// Higher tiers grow proportionally faster, so a legendary drop never
/// becomes less likely as luck rises.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RarityConfig {
    /// Weight of each tier at zero luck.
    #[serde(default = "default_rarity_base_weights")]
    pub base_weights: BTreeMap<Rarity, u32>,

    /// Percent bonus per luck point, multiplied by the tier rank.
    #[serde(default = "default_luck_bonus_pct")]
    pub luck_bonus_pct: u32,

    /// Percent taken off the common weight per luck point.
    #[serde(default = "default_common_penalty_pct")]
    pub common_penalty_pct: u32,

    /// The common weight never drops below this percent of its base.
    #[serde(default = "default_common_floor_pct")]
    pub common_floor_pct: u32,
}

impl Default for RarityConfig {
    fn default() -> Self {
        Self {
            base_weights: default_rarity_base_weights(),
            luck_bonus_pct: default_luck_bonus_pct(),
            common_penalty_pct: default_common_penalty_pct(),
            common_floor_pct: default_common_floor_pct(),
        }
    }
}

/// Percent bonuses granted per attribute point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatBonuses {
    /// Luck: extra base caps.
    #[serde(default = "default_luck_caps_pct")]
    pub luck_caps_pct: u32,

    /// Perception: extra item-find weight.
    #[serde(default = "default_perception_item_pct")]
    pub perception_item_pct: u32,

    /// Endurance: extra distance.
    #[serde(default = "default_endurance_distance_pct")]
    pub endurance_distance_pct: u32,

    /// Intelligence: extra base experience.
    #[serde(default = "default_intelligence_experience_pct")]
    pub intelligence_experience_pct: u32,
}

impl Default for StatBonuses {
    fn default() -> Self {
        Self {
            luck_caps_pct: default_luck_caps_pct(),
            perception_item_pct: default_perception_item_pct(),
            endurance_distance_pct: default_endurance_distance_pct(),
            intelligence_experience_pct: default_intelligence_experience_pct(),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver settings
// ---------------------------------------------------------------------------

/// Settings for the external tick scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Real-time milliseconds between scheduler ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated seconds that pass per scheduler tick.
    #[serde(default = "default_sim_seconds_per_tick")]
    pub sim_seconds_per_tick: u64,

    /// Stop after this many ticks (0 = run until no session is active).
    #[serde(default)]
    pub max_ticks: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            sim_seconds_per_tick: default_sim_seconds_per_tick(),
            max_ticks: 0,
        }
    }
}

/// Random seed settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RngConfig {
    /// Base seed for reward streams. `None` draws seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RngConfig {
    /// Override the seed with `SHELTER_SEED` when it holds a valid `u64`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = std::env::var(SEED_ENV_VAR)
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
        {
            self.seed = Some(seed);
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_allowed_durations_hours() -> Vec<u32> {
    vec![1, 2, 4, 8, 12, 24]
}

const fn default_encounters_per_hour() -> u32 {
    2
}

const fn default_caps_per_hour() -> u64 {
    40
}

const fn default_experience_per_hour() -> u64 {
    25
}

const fn default_distance_per_hour() -> u64 {
    6
}

const fn default_weight_nothing() -> u32 {
    45
}

const fn default_weight_caps() -> u32 {
    20
}

const fn default_weight_enemy() -> u32 {
    20
}

const fn default_weight_item() -> u32 {
    15
}

const fn default_caps_find_min() -> u64 {
    5
}

const fn default_caps_find_max() -> u64 {
    30
}

const fn default_base_win_pct() -> u32 {
    55
}

const fn default_strength_bonus_pct() -> u32 {
    5
}

const fn default_max_win_pct() -> u32 {
    95
}

const fn default_experience_per_kill() -> u64 {
    15
}

fn default_rarity_base_weights() -> BTreeMap<Rarity, u32> {
    BTreeMap::from([
        (Rarity::Common, 700),
        (Rarity::Uncommon, 200),
        (Rarity::Rare, 80),
        (Rarity::Legendary, 20),
    ])
}

const fn default_luck_bonus_pct() -> u32 {
    10
}

const fn default_common_penalty_pct() -> u32 {
    5
}

const fn default_common_floor_pct() -> u32 {
    20
}

fn default_item_type_weights() -> BTreeMap<ItemType, u32> {
    BTreeMap::from([
        (ItemType::Weapon, 30),
        (ItemType::Outfit, 30),
        (ItemType::Junk, 40),
    ])
}

fn default_item_values() -> BTreeMap<Rarity, u64> {
    BTreeMap::from([
        (Rarity::Common, 10),
        (Rarity::Uncommon, 40),
        (Rarity::Rare, 150),
        (Rarity::Legendary, 600),
    ])
}

const fn default_value_spread_pct() -> u32 {
    20
}

const fn default_luck_caps_pct() -> u32 {
    5
}

const fn default_perception_item_pct() -> u32 {
    5
}

const fn default_endurance_distance_pct() -> u32 {
    4
}

const fn default_intelligence_experience_pct() -> u32 {
    5
}

const fn default_tick_interval_ms() -> u64 {
    30_000
}

const fn default_sim_seconds_per_tick() -> u64 {
    30
}

fn default_log_level() -> String {
    String::from("info")
}
