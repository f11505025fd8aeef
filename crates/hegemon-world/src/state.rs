//! The in-memory working set for one engine run.
//!
//! [`WorldState`] is an arena of every entity a tick reads, keyed by
//! identifier. It is built once from a storage snapshot, validated so that
//! every cross-reference resolves, and then passed by value through the
//! tick phases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hegemon_types::{
    Caravan, CaravanId, LocationType, Region, RegionId, RegionLocation, RegionLocationId,
    Relation, RelationId, Village, VillageId,
};

use crate::error::WorldError;

/// Every entity loaded for one run, indexed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Villages with their upgrades and buildings.
    villages: BTreeMap<VillageId, Village>,
    /// Regions.
    regions: BTreeMap<RegionId, Region>,
    /// Region locations across all regions.
    locations: BTreeMap<RegionLocationId, RegionLocation>,
    /// Relations between villages.
    relations: BTreeMap<RelationId, Relation>,
    /// Caravans in flight.
    caravans: BTreeMap<CaravanId, Caravan>,
}

/// Insert keyed values, rejecting duplicate keys.
fn index<K: Ord + Copy + Into<i64>, V>(
    kind: &'static str,
    values: Vec<V>,
    key: impl Fn(&V) -> K,
) -> Result<BTreeMap<K, V>, WorldError> {
    let mut map = BTreeMap::new();
    for value in values {
        let id = key(&value);
        if map.insert(id, value).is_some() {
            return Err(WorldError::Duplicate {
                kind,
                id: id.into(),
            });
        }
    }
    Ok(map)
}

impl WorldState {
    /// Create an empty world.
    pub const fn new() -> Self {
        Self {
            villages: BTreeMap::new(),
            regions: BTreeMap::new(),
            locations: BTreeMap::new(),
            relations: BTreeMap::new(),
            caravans: BTreeMap::new(),
        }
    }

    /// Build a validated world from loaded rows.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Duplicate`] if two rows of one kind share an
    /// id, or any error from [`WorldState::validate`].
    pub fn from_parts(
        villages: Vec<Village>,
        regions: Vec<Region>,
        locations: Vec<RegionLocation>,
        relations: Vec<Relation>,
        caravans: Vec<Caravan>,
    ) -> Result<Self, WorldError> {
        let world = Self {
            villages: index("village", villages, |v| v.id)?,
            regions: index("region", regions, |r| r.id)?,
            locations: index("region location", locations, |l| l.id)?,
            relations: index("relation", relations, |r| r.id)?,
            caravans: index("caravan", caravans, |c| c.id)?,
        };
        world.validate()?;
        Ok(world)
    }

    /// Check that every reference in the world resolves.
    ///
    /// Castles and towns must have an occupant; other location types may
    /// be unoccupied. Each region has at most one castle.
    ///
    /// # Errors
    ///
    /// Returns the first integrity violation found.
    pub fn validate(&self) -> Result<(), WorldError> {
        for village in self.villages.values() {
            let foreign = village
                .upgrades
                .iter()
                .map(|u| u.village_id)
                .chain(village.buildings.iter().map(|b| b.village_id))
                .find(|owner| *owner != village.id);
            if let Some(owner) = foreign {
                return Err(WorldError::ForeignOwnership {
                    village: village.id,
                    owner,
                });
            }
        }

        for region in self.regions.values() {
            self.village(region.village_id)?;
            self.village(region.native_village_id)?;
        }

        let mut castles: BTreeMap<RegionId, RegionLocationId> = BTreeMap::new();
        for location in self.locations.values() {
            self.region(location.region_id)?;
            match (&location.location_type, location.occupying_village_id) {
                (LocationType::Castle | LocationType::Village, None) => {
                    return Err(WorldError::MissingOccupant(location.id));
                }
                (_, Some(occupant)) => {
                    self.village(occupant)?;
                }
                (LocationType::Other(_), None) => {}
            }
            if location.location_type == LocationType::Castle {
                if let Some(first) = castles.insert(location.region_id, location.id) {
                    return Err(WorldError::DuplicateCastle {
                        region: location.region_id,
                        first,
                        second: location.id,
                    });
                }
            }
        }

        for relation in self.relations.values() {
            for village in [relation.village1_id, relation.village2_id] {
                if !self.villages.contains_key(&village) {
                    return Err(WorldError::DanglingRelation {
                        relation: relation.id,
                        village,
                    });
                }
            }
        }

        for caravan in self.caravans.values() {
            if !self.regions.contains_key(&caravan.region_id)
                || !self.villages.contains_key(&caravan.village_id)
            {
                return Err(WorldError::DanglingCaravan(caravan.id));
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------
    // Villages
    // -------------------------------------------------------------------

    /// Look up a village.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingVillage`] if it does not exist.
    pub fn village(&self, id: VillageId) -> Result<&Village, WorldError> {
        self.villages.get(&id).ok_or(WorldError::MissingVillage(id))
    }

    /// Look up a village for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingVillage`] if it does not exist.
    pub fn village_mut(&mut self, id: VillageId) -> Result<&mut Village, WorldError> {
        self.villages
            .get_mut(&id)
            .ok_or(WorldError::MissingVillage(id))
    }

    /// All villages in id order.
    pub fn villages(&self) -> impl Iterator<Item = &Village> {
        self.villages.values()
    }

    /// All villages in id order, mutably.
    pub fn villages_mut(&mut self) -> impl Iterator<Item = &mut Village> {
        self.villages.values_mut()
    }

    /// Number of villages.
    pub fn village_count(&self) -> usize {
        self.villages.len()
    }

    // -------------------------------------------------------------------
    // Regions and locations
    // -------------------------------------------------------------------

    /// Look up a region.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingRegion`] if it does not exist.
    pub fn region(&self, id: RegionId) -> Result<&Region, WorldError> {
        self.regions.get(&id).ok_or(WorldError::MissingRegion(id))
    }

    /// All regions in id order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Identifiers of every region, in id order.
    pub fn region_ids(&self) -> Vec<RegionId> {
        self.regions.keys().copied().collect()
    }

    /// Look up a region location.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingLocation`] if it does not exist.
    pub fn location(&self, id: RegionLocationId) -> Result<&RegionLocation, WorldError> {
        self.locations
            .get(&id)
            .ok_or(WorldError::MissingLocation(id))
    }

    /// Look up a region location for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingLocation`] if it does not exist.
    pub fn location_mut(
        &mut self,
        id: RegionLocationId,
    ) -> Result<&mut RegionLocation, WorldError> {
        self.locations
            .get_mut(&id)
            .ok_or(WorldError::MissingLocation(id))
    }

    /// All region locations in id order.
    pub fn locations(&self) -> impl Iterator<Item = &RegionLocation> {
        self.locations.values()
    }

    /// Identifiers of the locations in one region, in id order.
    pub fn location_ids_in(&self, region: RegionId) -> Vec<RegionLocationId> {
        self.locations
            .values()
            .filter(|l| l.region_id == region)
            .map(|l| l.id)
            .collect()
    }

    /// The castle of a region, if it has one.
    pub fn castle_of(&self, region: RegionId) -> Option<&RegionLocation> {
        self.locations
            .values()
            .find(|l| l.region_id == region && l.location_type == LocationType::Castle)
    }

    // -------------------------------------------------------------------
    // Relations and caravans
    // -------------------------------------------------------------------

    /// All relations in id order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Wars that have not ended, in id order.
    pub fn active_wars(&self) -> Vec<&Relation> {
        self.relations
            .values()
            .filter(|r| r.is_active_war())
            .collect()
    }

    /// Look up a relation for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingRelation`] if it does not exist.
    pub fn relation_mut(&mut self, id: RelationId) -> Result<&mut Relation, WorldError> {
        self.relations
            .get_mut(&id)
            .ok_or(WorldError::MissingRelation(id))
    }

    /// All caravans in flight, in id order.
    pub fn caravans(&self) -> impl Iterator<Item = &Caravan> {
        self.caravans.values()
    }

    /// Number of caravans in flight.
    pub fn caravan_count(&self) -> usize {
        self.caravans.len()
    }

    /// Remove a settled caravan from the working set.
    pub fn remove_caravan(&mut self, id: CaravanId) -> Option<Caravan> {
        self.caravans.remove(&id)
    }

    /// Add a caravan to the working set.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Duplicate`] if the id is taken, or
    /// [`WorldError::DanglingCaravan`] if its region or village is unknown.
    pub fn insert_caravan(&mut self, caravan: Caravan) -> Result<(), WorldError> {
        if self.caravans.contains_key(&caravan.id) {
            return Err(WorldError::Duplicate {
                kind: "caravan",
                id: caravan.id.into_inner(),
            });
        }
        if !self.regions.contains_key(&caravan.region_id)
            || !self.villages.contains_key(&caravan.village_id)
        {
            return Err(WorldError::DanglingCaravan(caravan.id));
        }
        self.caravans.insert(caravan.id, caravan);
        Ok(())
    }

    /// The id after the highest caravan id in the working set.
    pub fn next_caravan_id(&self) -> CaravanId {
        let last = self.caravans.keys().next_back().map_or(0, |id| id.into_inner());
        CaravanId(last.saturating_add(1))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use hegemon_types::{
        CaravanKind, Policy, RelationKind, ResourceBundle, ResourceKind, Upgrade, UpgradeId,
        UpgradeStatus,
    };

    use super::*;

    pub(crate) fn village(id: i64) -> Village {
        Village {
            id: VillageId(id),
            name: format!("Village {id}"),
            resources: ResourceBundle::new(),
            resource_capacity: 1000,
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
        occupant: Option<i64>,
        stability: i32,
    ) -> RegionLocation {
        RegionLocation {
            id: RegionLocationId(id),
            region_id: RegionId(region),
            name: format!("Location {id}"),
            location_type,
            occupying_village_id: occupant.map(VillageId),
            resource: ResourceKind::Materials,
            resource_count: 0,
            stability,
            defense: stability,
            health: 100,
        }
    }

    #[test]
    fn from_parts_indexes_and_validates() {
        let world = WorldState::from_parts(
            vec![village(1), village(2)],
            vec![region(7, 1, 1)],
            vec![
                location(1, 7, LocationType::Castle, Some(1), 25),
                location(2, 7, LocationType::Village, Some(2), 25),
                location(3, 7, LocationType::Other("ruins".to_owned()), None, 0),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();

        assert_eq!(world.village_count(), 2);
        assert_eq!(world.location_ids_in(RegionId(7)).len(), 3);
        assert_eq!(world.castle_of(RegionId(7)).unwrap().id, RegionLocationId(1));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = WorldState::from_parts(
            vec![village(1), village(1)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(WorldError::Duplicate { kind: "village", id: 1 })
        ));
    }

    #[test]
    fn region_must_reference_existing_villages() {
        let result = WorldState::from_parts(
            vec![village(1)],
            vec![region(7, 1, 9)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(result, Err(WorldError::MissingVillage(VillageId(9)))));
    }

    #[test]
    fn towns_need_an_occupant() {
        let result = WorldState::from_parts(
            vec![village(1)],
            vec![region(7, 1, 1)],
            vec![location(4, 7, LocationType::Village, None, 0)],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(WorldError::MissingOccupant(RegionLocationId(4)))
        ));
    }

    #[test]
    fn second_castle_is_rejected() {
        let result = WorldState::from_parts(
            vec![village(1)],
            vec![region(7, 1, 1)],
            vec![
                location(1, 7, LocationType::Castle, Some(1), 0),
                location(2, 7, LocationType::Castle, Some(1), 0),
            ],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(result, Err(WorldError::DuplicateCastle { .. })));
    }

    #[test]
    fn foreign_upgrade_is_rejected() {
        let mut owner = village(1);
        owner.upgrades.push(Upgrade {
            id: UpgradeId(1),
            village_id: VillageId(2),
            key: "granary".to_owned(),
            status: UpgradeStatus::Active,
            research_progress: None,
            research_progress_required: None,
            research_progress_last_updated: None,
            research_boosted: false,
        });
        let result =
            WorldState::from_parts(vec![owner], Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert!(matches!(result, Err(WorldError::ForeignOwnership { .. })));
    }

    #[test]
    fn dangling_relations_and_caravans_are_rejected() {
        let war = Relation {
            id: RelationId(1),
            village1_id: VillageId(1),
            village2_id: VillageId(3),
            kind: RelationKind::War,
            relation_start: Utc::now(),
            relation_end: None,
        };
        let result = WorldState::from_parts(
            vec![village(1)],
            Vec::new(),
            Vec::new(),
            vec![war],
            Vec::new(),
        );
        assert!(matches!(result, Err(WorldError::DanglingRelation { .. })));

        let caravan = Caravan {
            id: CaravanId(5),
            start_time: Utc::now(),
            travel_time_ms: 1000,
            region_id: RegionId(42),
            village_id: VillageId(1),
            kind: CaravanKind::Resource,
            resources: "{}".to_owned(),
            name: "Village 1 Caravan".to_owned(),
        };
        let result = WorldState::from_parts(
            vec![village(1)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![caravan],
        );
        assert!(matches!(result, Err(WorldError::DanglingCaravan(CaravanId(5)))));
    }

    #[test]
    fn active_wars_skip_ended_and_peaceful_relations() {
        let now = Utc::now();
        let make = |id: i64, kind: RelationKind, ended: bool| Relation {
            id: RelationId(id),
            village1_id: VillageId(1),
            village2_id: VillageId(2),
            kind,
            relation_start: now,
            relation_end: ended.then_some(now),
        };
        let world = WorldState::from_parts(
            vec![village(1), village(2)],
            Vec::new(),
            Vec::new(),
            vec![
                make(1, RelationKind::War, false),
                make(2, RelationKind::War, true),
                make(3, RelationKind::Alliance, false),
            ],
            Vec::new(),
        )
        .unwrap();
        let wars: Vec<RelationId> = world.active_wars().iter().map(|r| r.id).collect();
        assert_eq!(wars, vec![RelationId(1)]);
    }
}
