//! Core entity structs for the Hegemon world simulation.
//!
//! These mirror the persisted rows the engine reads each tick. They hold
//! data only; the tick phases that mutate them live in `hegemon-core` and
//! the territorial math in `hegemon-world`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    BuildingStatus, CaravanKind, LocationType, RelationKind, ResourceKind, ResourceLogType,
    UpgradeEffect, UpgradeStatus,
};
use crate::ids::{
    BuildingId, CaravanId, RegionId, RegionLocationId, RelationId, UpgradeId, VillageId,
};

// ---------------------------------------------------------------------------
// Resource bundle
// ---------------------------------------------------------------------------

/// Errors decoding a persisted resource payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The payload is not a JSON object of integer quantities.
    #[error("payload is not a resource map: {0}")]
    Json(#[from] serde_json::Error),

    /// A key is not a known resource code.
    #[error("unknown resource code {0:?}")]
    UnknownResource(String),
}

/// Non-negative quantities per resource kind.
///
/// Quantities never go below zero: [`ResourceBundle::subtract`] clamps and
/// reports how much was actually removed. Equality ignores whether a zero
/// quantity is stored or absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceBundle {
    amounts: BTreeMap<ResourceKind, u64>,
}

impl ResourceBundle {
    /// Create an empty bundle.
    pub const fn new() -> Self {
        Self {
            amounts: BTreeMap::new(),
        }
    }

    /// Build a bundle from `(kind, quantity)` pairs, summing duplicates.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ResourceKind, u64)>) -> Self {
        let mut bundle = Self::new();
        for (kind, quantity) in pairs {
            bundle.add(kind, quantity);
        }
        bundle
    }

    /// Quantity held of one resource kind.
    pub fn get(&self, kind: ResourceKind) -> u64 {
        self.amounts.get(&kind).copied().unwrap_or(0)
    }

    /// Add to one resource kind, saturating at `u64::MAX`.
    pub fn add(&mut self, kind: ResourceKind, quantity: u64) {
        let slot = self.amounts.entry(kind).or_insert(0);
        *slot = slot.saturating_add(quantity);
    }

    /// Remove up to `quantity` of one resource kind.
    ///
    /// Returns the amount actually removed, which is less than `quantity`
    /// when the balance was insufficient.
    pub fn subtract(&mut self, kind: ResourceKind, quantity: u64) -> u64 {
        let slot = self.amounts.entry(kind).or_insert(0);
        let removed = quantity.min(*slot);
        *slot = slot.saturating_sub(removed);
        removed
    }

    /// Sum of every resource kind.
    pub fn total(&self) -> u64 {
        self.amounts
            .values()
            .fold(0_u64, |acc, quantity| acc.saturating_add(*quantity))
    }

    /// Whether every quantity is zero.
    pub fn is_empty(&self) -> bool {
        self.amounts.values().all(|quantity| *quantity == 0)
    }

    /// Iterate over every resource kind in code order, including zeros.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u64)> + '_ {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
    }

    /// Encode as the persisted JSON payload, keyed by resource code.
    ///
    /// Zero quantities are omitted.
    pub fn to_payload(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .amounts
            .iter()
            .filter(|(_, quantity)| **quantity > 0)
            .map(|(kind, quantity)| (kind.code().to_string(), serde_json::Value::from(*quantity)))
            .collect();
        serde_json::Value::Object(map).to_string()
    }

    /// Decode a persisted JSON payload keyed by resource code.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the payload is not an object of
    /// non-negative integers keyed by known resource codes.
    pub fn from_payload(payload: &str) -> Result<Self, PayloadError> {
        let raw: BTreeMap<String, u64> = serde_json::from_str(payload)?;
        let mut bundle = Self::new();
        for (key, quantity) in raw {
            let kind = key
                .parse::<i32>()
                .ok()
                .and_then(ResourceKind::from_code)
                .ok_or_else(|| PayloadError::UnknownResource(key.clone()))?;
            bundle.add(kind, quantity);
        }
        Ok(bundle)
    }
}

impl PartialEq for ResourceBundle {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for ResourceBundle {}

// ---------------------------------------------------------------------------
// Villages
// ---------------------------------------------------------------------------

/// A village's active policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Flat hourly production per resource kind.
    pub production: ResourceBundle,
    /// Added to the stability baseline of every location the village occupies.
    pub base_stability: i32,
}

/// A research upgrade owned by one village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrade {
    /// Row identifier.
    pub id: UpgradeId,
    /// Owning village.
    pub village_id: VillageId,
    /// Catalog key.
    pub key: String,
    /// Lifecycle status.
    pub status: UpgradeStatus,
    /// Accumulated time-weighted progress; `None` outside in-progress states.
    pub research_progress: Option<Decimal>,
    /// Progress needed to complete; `None` outside in-progress states.
    pub research_progress_required: Option<Decimal>,
    /// When progress was last advanced.
    pub research_progress_last_updated: Option<DateTime<Utc>>,
    /// Whether a speed boost was applied to the current research.
    pub research_boosted: bool,
}

/// A building owned by one village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Row identifier.
    pub id: BuildingId,
    /// Owning village.
    pub village_id: VillageId,
    /// Catalog key.
    pub key: String,
    /// Current tier.
    pub tier: u32,
    /// Construction status.
    pub status: BuildingStatus,
    /// Accumulated time-weighted progress while upgrading.
    pub construction_progress: Option<Decimal>,
    /// Progress needed to reach the next tier.
    pub construction_progress_required: Option<Decimal>,
    /// When progress was last advanced.
    pub construction_progress_last_updated: Option<DateTime<Utc>>,
    /// Whether a speed boost was applied to the current construction.
    pub construction_boosted: bool,
    /// Current health, bounded by the tier's maximum.
    pub health: i64,
}

/// A player faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Village {
    /// Row identifier.
    pub id: VillageId,
    /// Display name.
    pub name: String,
    /// Current resource balances.
    pub resources: ResourceBundle,
    /// Total storage before excess decay applies.
    pub resource_capacity: u64,
    /// Aggregate research score.
    pub research_score: i64,
    /// Aggregate construction score.
    pub construction_score: i64,
    /// Research progress per elapsed second.
    pub research_speed: Decimal,
    /// Construction progress per elapsed second.
    pub construction_speed: Decimal,
    /// Active policy.
    pub policy: Policy,
    /// Upgrades owned by the village.
    pub upgrades: Vec<Upgrade>,
    /// Buildings owned by the village.
    pub buildings: Vec<Building>,
    /// Effect totals from upgrades that currently grant effects.
    pub active_effects: BTreeMap<UpgradeEffect, i64>,
}

impl Village {
    /// Magnitude of one upgrade effect, zero if absent.
    pub fn effect(&self, effect: UpgradeEffect) -> i64 {
        self.active_effects.get(&effect).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// A top-level territorial grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Row identifier.
    pub id: RegionId,
    /// Display name.
    pub name: String,
    /// The village the region's caravans and collections go to.
    pub village_id: VillageId,
    /// The village the region originally belonged to.
    pub native_village_id: VillageId,
}

/// A site within a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLocation {
    /// Row identifier.
    pub id: RegionLocationId,
    /// Containing region.
    pub region_id: RegionId,
    /// Display name.
    pub name: String,
    /// Site type.
    pub location_type: LocationType,
    /// Village currently holding the site.
    pub occupying_village_id: Option<VillageId>,
    /// Resource the site produces.
    pub resource: ResourceKind,
    /// Produced resources awaiting collection or caravan pickup.
    pub resource_count: u64,
    /// Political alignment toward the occupant.
    pub stability: i32,
    /// Combat readiness, trailing stability within `[0, 100]`.
    pub defense: i32,
    /// Structural health.
    pub health: i64,
}

/// A relation between two villages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Row identifier.
    pub id: RelationId,
    /// First party.
    pub village1_id: VillageId,
    /// Second party.
    pub village2_id: VillageId,
    /// Relation kind.
    pub kind: RelationKind,
    /// When the relation began.
    pub relation_start: DateTime<Utc>,
    /// When the relation ended; `None` while it is in force.
    pub relation_end: Option<DateTime<Utc>>,
}

impl Relation {
    /// Whether this is a war that has not ended.
    pub const fn is_active_war(&self) -> bool {
        matches!(self.kind, RelationKind::War) && self.relation_end.is_none()
    }
}

/// An in-flight caravan as stored.
///
/// The payload is kept raw so a malformed row fails only its own
/// settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caravan {
    /// Row identifier.
    pub id: CaravanId,
    /// Departure time.
    pub start_time: DateTime<Utc>,
    /// Travel duration in milliseconds.
    pub travel_time_ms: i64,
    /// Origin region.
    pub region_id: RegionId,
    /// Destination village.
    pub village_id: VillageId,
    /// Caravan kind.
    pub kind: CaravanKind,
    /// JSON payload keyed by resource code.
    pub resources: String,
    /// Display name.
    pub name: String,
}

/// A caravan to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCaravan {
    /// Departure time.
    pub start_time: DateTime<Utc>,
    /// Travel duration in milliseconds.
    pub travel_time_ms: i64,
    /// Origin region.
    pub region_id: RegionId,
    /// Destination village.
    pub village_id: VillageId,
    /// Caravan kind.
    pub kind: CaravanKind,
    /// Cargo.
    pub resources: ResourceBundle,
    /// Display name.
    pub name: String,
}

/// One immutable resource movement for one village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLogEntry {
    /// The village the movement is attributed to.
    pub village_id: VillageId,
    /// Resource moved.
    pub resource: ResourceKind,
    /// Category of the movement.
    pub log_type: ResourceLogType,
    /// Quantity moved.
    pub quantity: u64,
    /// When the movement happened.
    pub logged_at: DateTime<Utc>,
}
