//! Vault roster: the dwellers the engine sends out on startup.
//!
//! Read from the `vault` section of `shelter-config.yaml`:
//!
//! ```yaml
//! vault:
//!   max_space: 20
//!   used_space: 12
//!   dwellers:
//!     - name: Nate
//!       duration_hours: 4
//!       recall_after_hours: 2
//!       special: { strength: 6, luck: 7 }
//! ```

use std::path::Path;

use serde::Deserialize;
use shelter_exploration::InMemoryVault;
use shelter_types::{DwellerId, SpecialStats, VaultId};

use crate::error::EngineError;

/// The vault and its expedition plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterConfig {
    /// Storage capacity in slots.
    #[serde(default = "default_max_space")]
    pub max_space: u32,

    /// Slots already taken at startup.
    #[serde(default)]
    pub used_space: u32,

    /// Dwellers to send out.
    #[serde(default = "default_dwellers")]
    pub dwellers: Vec<Expedition>,
}

/// One planned expedition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Expedition {
    /// Dweller name.
    pub name: String,

    /// Expedition length in hours.
    pub duration_hours: u32,

    /// Recall the dweller after this many simulated hours, if set.
    #[serde(default)]
    pub recall_after_hours: Option<u32>,

    /// S.P.E.C.I.A.L. attributes; missing ones read as zero.
    #[serde(default)]
    pub special: SpecialStats,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            max_space: default_max_space(),
            used_space: 0,
            dwellers: default_dwellers(),
        }
    }
}

const fn default_max_space() -> u32 {
    10
}

fn default_dwellers() -> Vec<Expedition> {
    vec![Expedition {
        name: String::from("Sole Survivor"),
        duration_hours: 2,
        recall_after_hours: None,
        special: SpecialStats::default(),
    }]
}

impl RosterConfig {
    /// Parse the `vault` section out of a full config document.
    ///
    /// A document without a `vault` key yields the default roster.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::Roster {
            message: format!("failed to parse config YAML: {e}"),
        })?;
        raw.get("vault").map_or_else(
            || Ok(Self::default()),
            |section| {
                serde_yml::from_value(section.clone()).map_err(|e| EngineError::Roster {
                    message: format!("failed to parse vault section: {e}"),
                })
            },
        )
    }

    /// Read the roster from a config file, or the default if it is absent.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Roster {
            message: format!("failed to read config file: {e}"),
        })?;
        Self::parse(&contents)
    }

    /// Create the vault and its dwellers in `store`.
    ///
    /// Returns the vault ID and each dweller's ID paired with their plan,
    /// in roster order.
    pub fn populate<'a>(
        &'a self,
        store: &InMemoryVault,
    ) -> Result<(VaultId, Vec<(DwellerId, &'a Expedition)>), EngineError> {
        let vault_id = store.add_vault(self.max_space, self.used_space);
        let mut crew = Vec::with_capacity(self.dwellers.len());
        for expedition in &self.dwellers {
            let dweller_id =
                store.add_dweller(vault_id, &expedition.name, expedition.special.clone(), None)?;
            crew.push((dweller_id, expedition));
        }
        Ok((vault_id, crew))
    }
}
