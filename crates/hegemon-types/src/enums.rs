//! Enumeration types for the Hegemon world simulation.
//!
//! Each enum carries the stable code or string it is persisted as, so the
//! storage layer never has to invent its own mapping.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// One of the fixed resource kinds a village can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Building materials (persisted as `1`).
    Materials,
    /// Food (persisted as `2`).
    Food,
    /// Wealth (persisted as `3`).
    Wealth,
}

impl ResourceKind {
    /// Every resource kind, in persisted-code order.
    pub const ALL: [Self; 3] = [Self::Materials, Self::Food, Self::Wealth];

    /// The persisted integer code.
    pub const fn code(self) -> i32 {
        match self {
            Self::Materials => 1,
            Self::Food => 2,
            Self::Wealth => 3,
        }
    }

    /// Look up a resource kind by its persisted integer code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Materials),
            2 => Some(Self::Food),
            3 => Some(Self::Wealth),
            _ => None,
        }
    }

    /// The upgrade effect that adds base production of this resource.
    pub const fn production_effect(self) -> UpgradeEffect {
        match self {
            Self::Materials => UpgradeEffect::MaterialsProduction,
            Self::Food => UpgradeEffect::FoodProduction,
            Self::Wealth => UpgradeEffect::WealthProduction,
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Materials => "materials",
            Self::Food => "food",
            Self::Wealth => "wealth",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Upgrades and buildings
// ---------------------------------------------------------------------------

/// Lifecycle status of a village upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    /// Researched but not switched on; pays no upkeep.
    Inactive,
    /// Research in progress.
    Researching,
    /// Researched and permanent; carries no upkeep.
    Unlocked,
    /// Being switched on.
    Activating,
    /// Switched on; pays upkeep every tick.
    Active,
}

impl UpgradeStatus {
    /// The persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Researching => "researching",
            Self::Unlocked => "unlocked",
            Self::Activating => "activating",
            Self::Active => "active",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inactive" => Some(Self::Inactive),
            "researching" => Some(Self::Researching),
            "unlocked" => Some(Self::Unlocked),
            "activating" => Some(Self::Activating),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    /// Whether progress fields are meaningful in this status.
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Researching | Self::Activating)
    }

    /// Whether the upgrade's effects currently apply to its village.
    pub const fn grants_effects(self) -> bool {
        matches!(self, Self::Active | Self::Unlocked)
    }
}

/// Construction status of a village building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStatus {
    /// Idle at its current tier.
    Default,
    /// Being upgraded to the next tier.
    Upgrading,
}

impl BuildingStatus {
    /// The persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Upgrading => "upgrading",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(Self::Default),
            "upgrading" => Some(Self::Upgrading),
            _ => None,
        }
    }
}

/// A kind of effect an upgrade contributes while it grants effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeEffect {
    /// Flat hourly materials production.
    MaterialsProduction,
    /// Flat hourly food production.
    FoodProduction,
    /// Flat hourly wealth production.
    WealthProduction,
    /// Added to the stability baseline of every location the village occupies.
    BaseStability,
    /// Subtracted from the baseline of the village's native towns held by others.
    OccupiedBaseStabilityReduction,
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// The kind of site a region location is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    /// The region's seat; at most one per region.
    Castle,
    /// A productive town.
    Village,
    /// Any other site type; inert for the simulation.
    Other(String),
}

impl LocationType {
    /// Parse the persisted string form.
    pub fn parse(value: &str) -> Self {
        match value {
            "castle" => Self::Castle,
            "village" => Self::Village,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The persisted string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Castle => "castle",
            Self::Village => "village",
            Self::Other(raw) => raw,
        }
    }
}

/// The kind of relation between two villages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// No standing agreement (persisted as `1`).
    Neutral,
    /// Allied villages (persisted as `2`).
    Alliance,
    /// Villages at war (persisted as `3`).
    War,
}

impl RelationKind {
    /// The persisted integer code.
    pub const fn code(self) -> i32 {
        match self {
            Self::Neutral => 1,
            Self::Alliance => 2,
            Self::War => 3,
        }
    }

    /// Look up a relation kind by its persisted integer code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Neutral),
            2 => Some(Self::Alliance),
            3 => Some(Self::War),
            _ => None,
        }
    }
}

/// The kind of caravan in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaravanKind {
    /// Carries region output to its village (persisted as `1`).
    Resource,
    /// Carries supplies for troops (persisted as `2`); never generated here.
    Supply,
}

impl CaravanKind {
    /// The persisted integer code.
    pub const fn code(self) -> i32 {
        match self {
            Self::Resource => 1,
            Self::Supply => 2,
        }
    }

    /// Look up a caravan kind by its persisted integer code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Resource),
            2 => Some(Self::Supply),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource log
// ---------------------------------------------------------------------------

/// The category of a resource log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLogType {
    /// Resources produced by a village or its territory.
    Production,
    /// Resources actually credited to a village's stores.
    Collection,
    /// Excess resources lost to storage decay.
    Decay,
    /// Resources spent maintaining active upgrades.
    UpgradeUpkeep,
}

impl ResourceLogType {
    /// The persisted integer code.
    pub const fn code(self) -> i32 {
        match self {
            Self::Production => 1,
            Self::Collection => 2,
            Self::Decay => 3,
            Self::UpgradeUpkeep => 4,
        }
    }

    /// Look up a log type by its persisted integer code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Production),
            2 => Some(Self::Collection),
            3 => Some(Self::Decay),
            4 => Some(Self::UpgradeUpkeep),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// One of the two independently scheduled engine pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// Progress, economy, war checks and territorial convergence.
    Hourly,
    /// Caravan settlement and generation.
    Caravan,
}

impl Pipeline {
    /// The persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Caravan => "caravan",
        }
    }
}

impl core::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
