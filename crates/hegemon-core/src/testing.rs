//! Fixtures shared by the unit tests in this crate.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use hegemon_types::{
    Building, BuildingId, BuildingStatus, LocationType, Policy, Region, RegionId,
    RegionLocation, RegionLocationId, ResourceBundle, ResourceKind, Upgrade, UpgradeId,
    UpgradeStatus, Village, VillageId,
};

use crate::catalog::Catalog;

pub(crate) fn village(id: i64) -> Village {
    Village {
        id: VillageId(id),
        name: format!("Village {id}"),
        resources: ResourceBundle::new(),
        resource_capacity: 10_000,
        research_score: 0,
        construction_score: 0,
        research_speed: Decimal::ONE,
        construction_speed: Decimal::ONE,
        policy: Policy::default(),
        upgrades: Vec::new(),
        buildings: Vec::new(),
        active_effects: BTreeMap::new(),
    }
}

pub(crate) fn upgrade(id: i64, village: i64, key: &str, status: UpgradeStatus) -> Upgrade {
    Upgrade {
        id: UpgradeId(id),
        village_id: VillageId(village),
        key: key.to_owned(),
        status,
        research_progress: None,
        research_progress_required: None,
        research_progress_last_updated: None,
        research_boosted: false,
    }
}

pub(crate) fn building(id: i64, village: i64, key: &str, tier: u32) -> Building {
    Building {
        id: BuildingId(id),
        village_id: VillageId(village),
        key: key.to_owned(),
        tier,
        status: BuildingStatus::Default,
        construction_progress: None,
        construction_progress_required: None,
        construction_progress_last_updated: None,
        construction_boosted: false,
        health: 100,
    }
}

pub(crate) fn region(id: i64, village: i64, native: i64) -> Region {
    Region {
        id: RegionId(id),
        name: format!("Region {id}"),
        village_id: VillageId(village),
        native_village_id: VillageId(native),
    }
}

pub(crate) fn location(
    id: i64,
    region: i64,
    location_type: LocationType,
    occupant: i64,
    resource: ResourceKind,
    resource_count: u64,
) -> RegionLocation {
    RegionLocation {
        id: RegionLocationId(id),
        region_id: RegionId(region),
        name: format!("Location {id}"),
        location_type,
        occupying_village_id: Some(VillageId(occupant)),
        resource,
        resource_count,
        stability: 0,
        defense: 0,
        health: 100,
    }
}

#[allow(clippy::unwrap_used)]
pub(crate) fn sample_catalog() -> Catalog {
    serde_yml::from_str(
        r"
upgrades:
  granary:
    upkeep: { food: 5 }
    effects: { food_production: 4 }
    research_score: 10
  militia:
    effects: { base_stability: 3 }
    research_score: 5
  free_trade:
    upkeep: { materials: 0, food: 0, wealth: 0 }
    research_score: 1
  quarry:
    upkeep: { materials: 5, food: 0, wealth: 0 }
    effects: { materials_production: 6 }
    research_score: 2
buildings:
  wall:
    max_health: [100, 250, 500]
    construction_score: [0, 20, 45]
",
    )
    .unwrap()
}
