//! Row types for the world tables and their conversion into domain types.
//!
//! Rows are read with runtime-checked `query_as`. Integer columns are
//! signed in `PostgreSQL`; conversion rejects negative counts and unknown
//! codes with [`DbError::Decode`] instead of clamping them.

use core::fmt;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use hegemon_types::{
    Building, BuildingId, BuildingStatus, Caravan, CaravanId, CaravanKind, LocationType, Policy,
    Region, RegionId, RegionLocation, RegionLocationId, Relation, RelationId, RelationKind,
    ResourceBundle, ResourceKind, Upgrade, UpgradeId, UpgradeStatus, Village, VillageId,
};

use crate::error::DbError;

fn decode(table: &'static str, column: &'static str, value: &dyn fmt::Display) -> DbError {
    DbError::Decode {
        table,
        column,
        value: value.to_string(),
    }
}

fn unsigned(table: &'static str, column: &'static str, value: i64) -> Result<u64, DbError> {
    u64::try_from(value)
        .ok()
        .ok_or_else(|| decode(table, column, &value))
}

/// A row from the `villages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VillageRow {
    /// Village id.
    pub village_id: i64,
    /// Display name.
    pub name: String,
    /// Resource balances as a JSON map keyed by resource code.
    pub resources: String,
    /// Storage capacity.
    pub resource_capacity: i64,
    /// Research score.
    pub research_score: i64,
    /// Construction score.
    pub construction_score: i64,
    /// Research progress per second.
    pub research_speed: Decimal,
    /// Construction progress per second.
    pub construction_speed: Decimal,
    /// Policy production as a JSON map keyed by resource code.
    pub policy_production: String,
    /// Policy stability modifier.
    pub policy_base_stability: i32,
}

impl VillageRow {
    /// Convert into a village with the given upgrades and buildings.
    ///
    /// Effect totals are left empty; the engine derives them from the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a resource map or the capacity is invalid.
    pub fn into_village(
        self,
        upgrades: Vec<Upgrade>,
        buildings: Vec<Building>,
    ) -> Result<Village, DbError> {
        Ok(Village {
            id: VillageId(self.village_id),
            name: self.name,
            resources: ResourceBundle::from_payload(&self.resources)?,
            resource_capacity: unsigned("villages", "resource_capacity", self.resource_capacity)?,
            research_score: self.research_score,
            construction_score: self.construction_score,
            research_speed: self.research_speed,
            construction_speed: self.construction_speed,
            policy: Policy {
                production: ResourceBundle::from_payload(&self.policy_production)?,
                base_stability: self.policy_base_stability,
            },
            upgrades,
            buildings,
            active_effects: BTreeMap::new(),
        })
    }
}

/// A row from the `village_upgrades` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpgradeRow {
    /// Row id.
    pub id: i64,
    /// Owning village.
    pub village_id: i64,
    /// Catalog key.
    pub key: String,
    /// Status string.
    pub status: String,
    /// Accumulated progress.
    pub research_progress: Option<Decimal>,
    /// Required progress.
    pub research_progress_required: Option<Decimal>,
    /// Last progress update.
    pub research_progress_last_updated: Option<DateTime<Utc>>,
    /// Boost flag.
    pub research_boosted: bool,
}

impl TryFrom<UpgradeRow> for Upgrade {
    type Error = DbError;

    fn try_from(row: UpgradeRow) -> Result<Self, Self::Error> {
        let status = UpgradeStatus::parse(&row.status)
            .ok_or_else(|| decode("village_upgrades", "status", &row.status))?;
        Ok(Self {
            id: UpgradeId(row.id),
            village_id: VillageId(row.village_id),
            key: row.key,
            status,
            research_progress: row.research_progress,
            research_progress_required: row.research_progress_required,
            research_progress_last_updated: row.research_progress_last_updated,
            research_boosted: row.research_boosted,
        })
    }
}

/// A row from the `village_buildings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BuildingRow {
    /// Row id.
    pub id: i64,
    /// Owning village.
    pub village_id: i64,
    /// Catalog key.
    pub key: String,
    /// Current tier.
    pub tier: i32,
    /// Status string.
    pub status: String,
    /// Accumulated progress.
    pub construction_progress: Option<Decimal>,
    /// Required progress.
    pub construction_progress_required: Option<Decimal>,
    /// Last progress update.
    pub construction_progress_last_updated: Option<DateTime<Utc>>,
    /// Boost flag.
    pub construction_boosted: bool,
    /// Current health.
    pub health: i64,
}

impl TryFrom<BuildingRow> for Building {
    type Error = DbError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        let status = BuildingStatus::parse(&row.status)
            .ok_or_else(|| decode("village_buildings", "status", &row.status))?;
        let tier = u32::try_from(row.tier)
            .ok()
            .ok_or_else(|| decode("village_buildings", "tier", &row.tier))?;
        Ok(Self {
            id: BuildingId(row.id),
            village_id: VillageId(row.village_id),
            key: row.key,
            tier,
            status,
            construction_progress: row.construction_progress,
            construction_progress_required: row.construction_progress_required,
            construction_progress_last_updated: row.construction_progress_last_updated,
            construction_boosted: row.construction_boosted,
            health: row.health,
        })
    }
}

/// A row from the `regions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegionRow {
    /// Region id.
    pub region_id: i64,
    /// Display name.
    pub name: String,
    /// Designated village.
    pub village_id: i64,
    /// Native village.
    pub native_village_id: i64,
}

impl From<RegionRow> for Region {
    fn from(row: RegionRow) -> Self {
        Self {
            id: RegionId(row.region_id),
            name: row.name,
            village_id: VillageId(row.village_id),
            native_village_id: VillageId(row.native_village_id),
        }
    }
}

/// A row from the `region_locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegionLocationRow {
    /// Location id.
    pub region_location_id: i64,
    /// Containing region.
    pub region_id: i64,
    /// Display name.
    pub name: String,
    /// Location type string.
    #[sqlx(rename = "type")]
    pub location_type: String,
    /// Occupying village, if any.
    pub occupying_village_id: Option<i64>,
    /// Resource code.
    pub resource_id: i32,
    /// Accrued count.
    pub resource_count: i64,
    /// Stability.
    pub stability: i32,
    /// Defense.
    pub defense: i32,
    /// Health.
    pub health: i64,
}

impl TryFrom<RegionLocationRow> for RegionLocation {
    type Error = DbError;

    fn try_from(row: RegionLocationRow) -> Result<Self, Self::Error> {
        let resource = ResourceKind::from_code(row.resource_id)
            .ok_or_else(|| decode("region_locations", "resource_id", &row.resource_id))?;
        Ok(Self {
            id: RegionLocationId(row.region_location_id),
            region_id: RegionId(row.region_id),
            name: row.name,
            location_type: LocationType::parse(&row.location_type),
            occupying_village_id: row.occupying_village_id.map(VillageId),
            resource,
            resource_count: unsigned("region_locations", "resource_count", row.resource_count)?,
            stability: row.stability,
            defense: row.defense,
            health: row.health,
        })
    }
}

/// A row from the `village_relations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RelationRow {
    /// Relation id.
    pub relation_id: i64,
    /// First party.
    pub village1_id: i64,
    /// Second party.
    pub village2_id: i64,
    /// Relation kind code.
    pub relation_type: i32,
    /// Start time.
    pub relation_start: DateTime<Utc>,
    /// End time, if ended.
    pub relation_end: Option<DateTime<Utc>>,
}

impl TryFrom<RelationRow> for Relation {
    type Error = DbError;

    fn try_from(row: RelationRow) -> Result<Self, Self::Error> {
        let kind = RelationKind::from_code(row.relation_type)
            .ok_or_else(|| decode("village_relations", "relation_type", &row.relation_type))?;
        Ok(Self {
            id: RelationId(row.relation_id),
            village1_id: VillageId(row.village1_id),
            village2_id: VillageId(row.village2_id),
            kind,
            relation_start: row.relation_start,
            relation_end: row.relation_end,
        })
    }
}

/// A row from the `caravans` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaravanRow {
    /// Caravan id.
    pub id: i64,
    /// Departure time.
    pub start_time: DateTime<Utc>,
    /// Travel time in milliseconds.
    pub travel_time: i64,
    /// Origin region.
    pub region_id: i64,
    /// Destination village.
    pub village_id: i64,
    /// Caravan kind code.
    pub caravan_type: i32,
    /// Raw resource payload.
    pub resources: String,
    /// Display name.
    pub name: String,
}

impl TryFrom<CaravanRow> for Caravan {
    type Error = DbError;

    /// The payload is kept raw; a bad payload fails only its settlement.
    fn try_from(row: CaravanRow) -> Result<Self, Self::Error> {
        let kind = CaravanKind::from_code(row.caravan_type)
            .ok_or_else(|| decode("caravans", "caravan_type", &row.caravan_type))?;
        Ok(Self {
            id: CaravanId(row.id),
            start_time: row.start_time,
            travel_time_ms: row.travel_time,
            region_id: RegionId(row.region_id),
            village_id: VillageId(row.village_id),
            kind,
            resources: row.resources,
            name: row.name,
        })
    }
}
