//! Reward generation for wasteland expeditions.
//!
//! [`RewardGenerator::generate`] maps an elapsed fraction, the expedition
//! length, the dweller's attributes, and an RNG stream to a
//! [`RewardBundle`]. Nothing here touches session or vault state.
//!
//! Rewards come in two flavours:
//!
//! - **Continuous** (base caps, base experience, distance): accrue at the
//!   configured hourly rates. On early recall they are multiplied by the
//!   elapsed fraction and floored.
//! - **Discrete** (caps stashes, fights, item finds): one weighted roll per
//!   encounter tick that has elapsed. Already-resolved rolls are never
//!   scaled.
//!
//! Encounters consume the stream strictly in order, so for a fixed seed the
//! first `k` encounters are the same no matter how much time has passed
//! beyond them.

use rand::Rng;
use shelter_types::{ItemType, LootItem, Rarity, Special, SpecialStats};

use crate::config::ExplorationConfig;

/// Seconds in one simulated hour.
pub const SECONDS_PER_HOUR: u64 = 3600;

/// Inputs to one reward computation.
#[derive(Debug, Clone, Copy)]
pub struct RewardRequest<'a> {
    /// Portion of the expedition that elapsed, `0.0..=1.0` (clamped).
    pub elapsed_fraction: f64,
    /// Full length of the expedition in hours.
    pub duration_hours: u32,
    /// The dweller's attributes; missing stats count as zero.
    pub attributes: &'a SpecialStats,
}

/// Outcome of a single encounter roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encounter {
    /// Nothing happened.
    Nothing,
    /// A stash of caps.
    Caps(u64),
    /// A fight; `defeated` is whether the dweller won.
    Enemy {
        /// Whether the enemy was defeated.
        defeated: bool,
    },
    /// An item find.
    Item(LootItem),
}

impl Encounter {
    /// Whether the encounter counts as an event.
    pub const fn is_event(&self) -> bool {
        !matches!(self, Self::Nothing)
    }
}

/// Full-duration continuous rewards before any proration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContinuousRewards {
    /// Caps scavenged over the whole expedition.
    pub caps: u64,
    /// Experience over the whole expedition.
    pub experience: u64,
    /// Distance over the whole expedition.
    pub distance: u64,
}

/// Everything the generator produced for one elapsed fraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewardBundle {
    /// Fraction the bundle was computed for (clamped).
    pub elapsed_fraction: f64,
    /// Number of encounter ticks rolled.
    pub encounters_rolled: u32,
    /// Continuous caps (prorated on early recall).
    pub base_caps: u64,
    /// Caps from stash encounters.
    pub found_caps: u64,
    /// Continuous experience (prorated on early recall).
    pub base_experience: u64,
    /// Experience from defeated enemies.
    pub combat_experience: u64,
    /// Distance covered (prorated on early recall).
    pub distance: u64,
    /// Enemies defeated.
    pub enemies_defeated: u32,
    /// Non-empty encounters.
    pub events_encountered: u32,
    /// Loot in the order it was found. Not yet placed into storage.
    pub loot: Vec<LootItem>,
}

impl RewardBundle {
    /// Total caps to credit.
    pub const fn caps(&self) -> u64 {
        self.base_caps.saturating_add(self.found_caps)
    }

    /// Total experience to credit.
    pub const fn experience(&self) -> u64 {
        self.base_experience.saturating_add(self.combat_experience)
    }

    /// Whether continuous rewards were scaled down for an early recall.
    pub fn is_prorated(&self) -> bool {
        self.elapsed_fraction < 1.0
    }

    fn record(&mut self, encounter: Encounter, experience_per_kill: u64) {
        if encounter.is_event() {
            self.events_encountered = self.events_encountered.saturating_add(1);
        }
        match encounter {
            Encounter::Nothing | Encounter::Enemy { defeated: false } => {}
            Encounter::Caps(amount) => {
                self.found_caps = self.found_caps.saturating_add(amount);
            }
            Encounter::Enemy { defeated: true } => {
                self.enemies_defeated = self.enemies_defeated.saturating_add(1);
                self.combat_experience =
                    self.combat_experience.saturating_add(experience_per_kill);
            }
            Encounter::Item(item) => self.loot.push(item),
        }
    }
}

/// Deterministic-given-seed reward generator driven by an
/// [`ExplorationConfig`] table.
#[derive(Debug, Clone, Default)]
pub struct RewardGenerator {
    config: ExplorationConfig,
}

impl RewardGenerator {
    /// Create a generator over the given balance table.
    pub const fn new(config: ExplorationConfig) -> Self {
        Self { config }
    }

    /// The balance table in use.
    pub const fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    /// Compute rewards for the elapsed part of an expedition.
    ///
    /// Never fails: out-of-range fractions are clamped and missing
    /// attributes read as zero.
    pub fn generate(&self, request: &RewardRequest<'_>, rng: &mut impl Rng) -> RewardBundle {
        let fraction = clamp_fraction(request.elapsed_fraction);
        let full = self.full_continuous(request.duration_hours, request.attributes);

        let mut bundle = RewardBundle {
            elapsed_fraction: fraction,
            encounters_rolled: self.encounter_count(fraction, request.duration_hours),
            base_caps: prorate(full.caps, fraction),
            base_experience: prorate(full.experience, fraction),
            distance: prorate(full.distance, fraction),
            ..RewardBundle::default()
        };

        for index in 0..bundle.encounters_rolled {
            let encounter = self.roll_encounter(index, request.attributes, rng);
            bundle.record(encounter, self.config.combat.experience_per_kill);
        }

        bundle
    }

    /// Number of encounter ticks covered by `elapsed_fraction` of an
    /// expedition of `duration_hours`.
    pub fn encounter_count(&self, elapsed_fraction: f64, duration_hours: u32) -> u32 {
        let total = duration_hours.saturating_mul(self.config.encounters_per_hour);
        let fraction = clamp_fraction(elapsed_fraction);
        if fraction >= 1.0 {
            return total;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let elapsed = (f64::from(total) * fraction).floor() as u32;
        elapsed.min(total)
    }

    /// Continuous rewards for the whole expedition, attribute bonuses included.
    pub fn full_continuous(&self, duration_hours: u32, attributes: &SpecialStats) -> ContinuousRewards {
        let hours = u64::from(duration_hours);
        let rates = &self.config.rates;
        let bonuses = &self.config.stat_bonuses;
        ContinuousRewards {
            caps: with_bonus(
                rates.caps_per_hour.saturating_mul(hours),
                attributes.get(Special::Luck),
                bonuses.luck_caps_pct,
            ),
            experience: with_bonus(
                rates.experience_per_hour.saturating_mul(hours),
                attributes.get(Special::Intelligence),
                bonuses.intelligence_experience_pct,
            ),
            distance: with_bonus(
                rates.distance_per_hour.saturating_mul(hours),
                attributes.get(Special::Endurance),
                bonuses.endurance_distance_pct,
            ),
        }
    }

    /// Roll the outcome of one encounter tick.
    pub fn roll_encounter(
        &self,
        index: u32,
        attributes: &SpecialStats,
        rng: &mut impl Rng,
    ) -> Encounter {
        let weights = &self.config.encounters;
        let item_weight = u32::try_from(with_bonus(
            u64::from(weights.item),
            attributes.get(Special::Perception),
            self.config.stat_bonuses.perception_item_pct,
        ))
        .unwrap_or(u32::MAX);

        let table = [
            (EncounterKind::Nothing, weights.nothing),
            (EncounterKind::Caps, weights.caps),
            (EncounterKind::Enemy, weights.enemy),
            (EncounterKind::Item, item_weight),
        ];

        match pick_weighted(table, rng).unwrap_or(EncounterKind::Nothing) {
            EncounterKind::Nothing => Encounter::Nothing,
            EncounterKind::Caps => {
                let low = self.config.caps_find_min;
                let high = self.config.caps_find_max.max(low);
                Encounter::Caps(rng.random_range(low..=high))
            }
            EncounterKind::Enemy => {
                let combat = &self.config.combat;
                let win_pct = combat
                    .strength_bonus_pct
                    .saturating_mul(attributes.get(Special::Strength))
                    .saturating_add(combat.base_win_pct)
                    .min(combat.max_win_pct);
                let roll: u32 = rng.random_range(0..100);
                Encounter::Enemy {
                    defeated: roll < win_pct,
                }
            }
            EncounterKind::Item => {
                Encounter::Item(self.roll_item(index, attributes.get(Special::Luck), rng))
            }
        }
    }

    /// Roll a single loot item for a dweller with the given luck.
    pub fn roll_item(&self, encounter: u32, luck: u32, rng: &mut impl Rng) -> LootItem {
        let rarity = self.roll_rarity(luck, rng);
        let item_type = pick_weighted(
            self.config
                .item_type_weights
                .iter()
                .map(|(kind, weight)| (*kind, *weight)),
            rng,
        )
        .unwrap_or(ItemType::Junk);

        let base = self.config.item_values.get(&rarity).copied().unwrap_or(0);
        let spread = base
            .saturating_mul(u64::from(self.config.value_spread_pct))
            .checked_div(100)
            .unwrap_or(0);
        let offset = rng.random_range(0..=spread.saturating_mul(2));
        let value = base.saturating_sub(spread).saturating_add(offset);

        LootItem {
            item_type,
            rarity,
            value,
            encounter,
        }
    }

    /// Roll a rarity tier for a dweller with the given luck.
    pub fn roll_rarity(&self, luck: u32, rng: &mut impl Rng) -> Rarity {
        let weights = self.rarity_weights(luck);
        let total: f64 = weights.iter().map(|(_, w)| *w).sum();
        if total <= 0.0 {
            return Rarity::Common;
        }

        let mut remaining = rng.random::<f64>() * total;
        let mut fallback = Rarity::Common;
        for (rarity, weight) in weights {
            if weight <= 0.0 {
                continue;
            }
            if remaining < weight {
                return rarity;
            }
            remaining -= weight;
            fallback = rarity;
        }
        // Only reachable through float rounding at the very top of the range.
        fallback
    }

    /// Effective weight of each tier at the given luck, common first.
    pub fn rarity_weights(&self, luck: u32) -> [(Rarity, f64); 4] {
        let curve = &self.config.rarity;
        let luck = f64::from(luck);
        Rarity::ALL.map(|rarity| {
            let base = f64::from(curve.base_weights.get(&rarity).copied().unwrap_or(0));
            let pct = if rarity == Rarity::Common {
                let penalty = luck * f64::from(curve.common_penalty_pct);
                (100.0 - penalty).max(f64::from(curve.common_floor_pct))
            } else {
                100.0 + luck * f64::from(curve.luck_bonus_pct) * f64::from(rarity.rank())
            };
            (rarity, base * pct / 100.0)
        })
    }

    /// Probability (0.0 to 1.0) that an item find is of `rarity`.
    pub fn rarity_chance(&self, luck: u32, rarity: Rarity) -> f64 {
        let weights = self.rarity_weights(luck);
        let total: f64 = weights.iter().map(|(_, w)| *w).sum();
        if total <= 0.0 {
            return 0.0;
        }
        weights
            .iter()
            .find(|(tier, _)| *tier == rarity)
            .map_or(0.0, |(_, w)| *w / total)
    }
}

#[derive(Debug, Clone, Copy)]
enum EncounterKind {
    Nothing,
    Caps,
    Enemy,
    Item,
}

/// Clamp a fraction into `0.0..=1.0`, mapping NaN to zero.
pub fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Scale a continuous quantity by the elapsed fraction, flooring.
pub fn prorate(full: u64, fraction: f64) -> u64 {
    let fraction = clamp_fraction(fraction);
    if fraction >= 1.0 {
        return full;
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let scaled = (full as f64 * fraction).floor() as u64;
    scaled.min(full)
}

/// Apply a `stat * pct_per_point` percent bonus to `amount`.
fn with_bonus(amount: u64, stat: u32, pct_per_point: u32) -> u64 {
    let pct = u64::from(stat.saturating_mul(pct_per_point)).saturating_add(100);
    amount.saturating_mul(pct).checked_div(100).unwrap_or(amount)
}

/// Pick a key from `(key, weight)` pairs in proportion to the weights.
///
/// Returns `None` when every weight is zero.
fn pick_weighted<K: Copy>(
    entries: impl IntoIterator<Item = (K, u32)>,
    rng: &mut impl Rng,
) -> Option<K> {
    let entries: Vec<(K, u32)> = entries.into_iter().filter(|(_, w)| *w > 0).collect();
    let total: u64 = entries.iter().map(|(_, w)| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.random_range(0..total);
    for (key, weight) in &entries {
        let weight = u64::from(*weight);
        if roll < weight {
            return Some(*key);
        }
        roll = roll.saturating_sub(weight);
    }
    entries.last().map(|(key, _)| *key)
}
