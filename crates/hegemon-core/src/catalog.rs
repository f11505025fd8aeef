//! Game catalog: static upgrade and building tables.
//!
//! Upgrades and buildings are stored with only a key; their upkeep,
//! effects, health, and score contributions come from this catalog, which
//! is loaded as the `catalog` section of the configuration file.

use std::collections::BTreeMap;

use serde::Deserialize;

use hegemon_types::{ResourceBundle, UpgradeEffect, Village};

/// Errors looking up catalog entries.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No upgrade with this key is defined.
    #[error("unknown upgrade key {0:?}")]
    UnknownUpgrade(String),

    /// No building with this key is defined.
    #[error("unknown building key {0:?}")]
    UnknownBuilding(String),

    /// The building has no entry for this tier.
    #[error("building {key:?} has no tier {tier}")]
    UnknownTier {
        /// Building key.
        key: String,
        /// Requested tier.
        tier: u32,
    },
}

/// Static definition of one upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpgradeSpec {
    /// Hourly upkeep while the upgrade is active.
    #[serde(default)]
    pub upkeep: ResourceBundle,

    /// Effect magnitudes granted while active or unlocked.
    #[serde(default)]
    pub effects: BTreeMap<UpgradeEffect, i64>,

    /// Contribution to the owner's research score once researched.
    #[serde(default)]
    pub research_score: i64,
}

/// Static definition of one building, indexed by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildingSpec {
    /// Maximum health at each tier; index 0 is tier 0.
    #[serde(default)]
    pub max_health: Vec<i64>,

    /// Contribution to the owner's construction score at each tier.
    #[serde(default)]
    pub construction_score: Vec<i64>,
}

/// The upgrade and building tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Catalog {
    /// Upgrades by key.
    #[serde(default)]
    pub upgrades: BTreeMap<String, UpgradeSpec>,

    /// Buildings by key.
    #[serde(default)]
    pub buildings: BTreeMap<String, BuildingSpec>,
}

impl Catalog {
    /// Look up an upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownUpgrade`] if the key is not defined.
    pub fn upgrade(&self, key: &str) -> Result<&UpgradeSpec, CatalogError> {
        self.upgrades
            .get(key)
            .ok_or_else(|| CatalogError::UnknownUpgrade(key.to_owned()))
    }

    /// Look up a building.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownBuilding`] if the key is not defined.
    pub fn building(&self, key: &str) -> Result<&BuildingSpec, CatalogError> {
        self.buildings
            .get(key)
            .ok_or_else(|| CatalogError::UnknownBuilding(key.to_owned()))
    }

    /// Whether an upgrade costs nothing to keep active.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownUpgrade`] if the key is not defined.
    pub fn is_upkeep_free(&self, key: &str) -> Result<bool, CatalogError> {
        Ok(self.upgrade(key)?.upkeep.is_empty())
    }

    /// Maximum health of a building at a tier.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the key or tier is not defined.
    pub fn max_health(&self, key: &str, tier: u32) -> Result<i64, CatalogError> {
        let spec = self.building(key)?;
        usize::try_from(tier)
            .ok()
            .and_then(|t| spec.max_health.get(t))
            .copied()
            .ok_or_else(|| CatalogError::UnknownTier {
                key: key.to_owned(),
                tier,
            })
    }

    /// Construction score of a building at a tier; zero past the table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownBuilding`] if the key is not defined.
    pub fn construction_score(&self, key: &str, tier: u32) -> Result<i64, CatalogError> {
        let spec = self.building(key)?;
        Ok(usize::try_from(tier)
            .ok()
            .and_then(|t| spec.construction_score.get(t))
            .copied()
            .unwrap_or(0))
    }

    /// Sum the effects of every upgrade that currently grants effects.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownUpgrade`] for an upgrade key missing
    /// from the catalog.
    pub fn active_effects(
        &self,
        village: &Village,
    ) -> Result<BTreeMap<UpgradeEffect, i64>, CatalogError> {
        let mut totals: BTreeMap<UpgradeEffect, i64> = BTreeMap::new();
        for upgrade in village.upgrades.iter().filter(|u| u.status.grants_effects()) {
            for (effect, magnitude) in &self.upgrade(&upgrade.key)?.effects {
                let slot = totals.entry(*effect).or_insert(0);
                *slot = slot.saturating_add(*magnitude);
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hegemon_types::{ResourceKind, UpgradeStatus};

    use super::*;
    use crate::testing::{sample_catalog as sample, upgrade, village};

    #[test]
    fn parses_yaml_tables() {
        let catalog = sample();
        let granary = catalog.upgrade("granary").unwrap();
        assert_eq!(granary.upkeep.get(ResourceKind::Food), 5);
        assert!(!catalog.is_upkeep_free("granary").unwrap());
        assert!(catalog.is_upkeep_free("militia").unwrap());
        assert_eq!(catalog.max_health("wall", 2).unwrap(), 500);
    }

    #[test]
    fn unknown_entries_are_errors() {
        let catalog = sample();
        assert!(matches!(
            catalog.upgrade("moat"),
            Err(CatalogError::UnknownUpgrade(_))
        ));
        assert!(matches!(
            catalog.max_health("wall", 3),
            Err(CatalogError::UnknownTier { tier: 3, .. })
        ));
        assert_eq!(catalog.construction_score("wall", 9).unwrap(), 0);
    }

    #[test]
    fn effects_sum_over_active_and_unlocked() {
        let catalog = sample();
        let mut v = village(1);
        v.upgrades = vec![
            upgrade(1, 1, "granary", UpgradeStatus::Active),
            upgrade(2, 1, "militia", UpgradeStatus::Unlocked),
            upgrade(3, 1, "granary", UpgradeStatus::Inactive),
        ];
        let effects = catalog.active_effects(&v).unwrap();
        assert_eq!(effects.get(&UpgradeEffect::FoodProduction), Some(&4));
        assert_eq!(effects.get(&UpgradeEffect::BaseStability), Some(&3));
    }
}
