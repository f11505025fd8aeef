//! The caravan cycle: settle everything in flight, then dispatch new cargo.
//!
//! Settlement always completes before generation, and deletes every
//! caravan: no caravan survives into the next cycle. Each resource
//! caravan's payload is decoded and credited to its destination village.
//! A payload that cannot be decoded is reported and credits nothing.
//! Supply caravans are deleted without credit.
//!
//! Generation dispatches exactly one caravan per non-home region, even
//! when nothing accrued. The counts accrued at each of the region's
//! locations are drained into its payload, bound for the region's owner.
//! Draining writes only the locations' counts. Departure is drawn
//! uniformly from `[now, now + period - travel_time]`, so every caravan
//! lands before the next settlement.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use hegemon_ledger::credit_bundle;
use hegemon_types::{CaravanKind, NewCaravan, ResourceBundle, VillageId};
use hegemon_world::WorldState;

use crate::config::{HegemonConfig, WorldConfig};
use crate::mutation::{Mutation, MutationBatch};
use crate::tick::{TickError, TickIssue, TickOutcome};

/// Credit every decodable resource caravan, then delete every caravan.
///
/// Returns the number of caravans credited.
///
/// # Errors
///
/// Returns [`TickError::World`] if a destination village does not exist.
pub fn settle_caravans(
    world: &mut WorldState,
    batch: &mut MutationBatch,
    issues: &mut Vec<TickIssue>,
) -> Result<usize, TickError> {
    let pending: Vec<_> = world
        .caravans()
        .map(|c| (c.id, c.village_id, c.kind, c.resources.clone()))
        .collect();

    let mut credited: BTreeSet<VillageId> = BTreeSet::new();
    let mut settled = 0_usize;
    let mut deleted = Vec::with_capacity(pending.len());
    for (id, village_id, kind, payload) in pending {
        world.remove_caravan(id);
        deleted.push(id);
        if kind != CaravanKind::Resource {
            debug!(caravan = %id, ?kind, "Caravan removed without credit");
            continue;
        }
        let cargo = match ResourceBundle::from_payload(&payload) {
            Ok(cargo) => cargo,
            Err(e) => {
                warn!(
                    caravan = %id,
                    error = %e,
                    "Caravan payload unreadable, removed without credit"
                );
                issues.push(TickIssue::MalformedCaravan {
                    caravan: id,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        credit_bundle(world.village_mut(village_id)?, &cargo);
        credited.insert(village_id);
        settled = settled.saturating_add(1);
        debug!(caravan = %id, village = %village_id, cargo = cargo.total(), "Caravan settled");
    }

    for village_id in &credited {
        batch.push(Mutation::village_resources(world.village(*village_id)?));
    }
    batch.extend(deleted.into_iter().map(Mutation::DeleteCaravan));
    Ok(settled)
}

/// Latest departure offset, in milliseconds, that still arrives in time.
fn departure_window_ms(config: &WorldConfig) -> u64 {
    config
        .caravan_period_secs
        .saturating_mul(1000)
        .saturating_sub(config.caravan_travel_time_ms)
}

/// Dispatch one caravan per non-home region, draining its accrued counts.
///
/// A region with nothing accrued still gets a caravan with an empty
/// payload. Returns the number of caravans created.
///
/// # Errors
///
/// Returns [`TickError::World`] if a region's owner or a location does not
/// resolve.
pub fn generate_caravans(
    world: &mut WorldState,
    config: &HegemonConfig,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
    batch: &mut MutationBatch,
) -> Result<usize, TickError> {
    let rules = config.territory_rules();
    let window = departure_window_ms(&config.world);
    let travel_time_ms = i64::try_from(config.world.caravan_travel_time_ms).unwrap_or(i64::MAX);
    let mut created = 0_usize;

    for region_id in world.region_ids() {
        if rules.is_home_region(region_id) {
            continue;
        }
        let owner = world.region(region_id)?.village_id;

        let mut cargo = ResourceBundle::new();
        for location_id in world.location_ids_in(region_id) {
            let location = world.location_mut(location_id)?;
            if location.resource_count == 0 {
                continue;
            }
            cargo.add(location.resource, core::mem::take(&mut location.resource_count));
            batch.push(Mutation::LocationResourceCount {
                location_id,
                resource_count: 0,
            });
        }

        let offset = i64::try_from(rng.random_range(0..=window)).unwrap_or(0);
        let start_time = now
            .checked_add_signed(Duration::milliseconds(offset))
            .unwrap_or(now);
        let name = format!("{} Caravan", world.village(owner)?.name);
        debug!(
            region = %region_id,
            village = %owner,
            cargo = cargo.total(),
            %start_time,
            "Caravan dispatched"
        );
        batch.push(Mutation::InsertCaravan(NewCaravan {
            start_time,
            travel_time_ms,
            region_id,
            village_id: owner,
            kind: CaravanKind::Resource,
            resources: cargo,
            name,
        }));
        created = created.saturating_add(1);
    }
    Ok(created)
}

/// Run settlement and then generation over the working set.
///
/// # Errors
///
/// Returns a [`TickError`] for any failure that must abort the run.
pub fn caravan_cycle(
    world: &mut WorldState,
    config: &HegemonConfig,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<TickOutcome, TickError> {
    let mut outcome = TickOutcome::default();
    let settled = settle_caravans(world, &mut outcome.batch, &mut outcome.issues)?;
    let created = generate_caravans(world, config, rng, now, &mut outcome.batch)?;
    info!(
        settled,
        created,
        malformed = outcome.issues.len(),
        mutations = outcome.batch.len(),
        "Caravan cycle computed"
    );
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hegemon_types::{
        Caravan, CaravanId, LocationType, RegionId, RegionLocationId, ResourceKind,
    };
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::testing::{location, region, village};

    fn supply(id: i64, village: i64) -> Caravan {
        Caravan {
            kind: CaravanKind::Supply,
            ..caravan(id, village, r#"{"2":40}"#)
        }
    }

    fn caravan(id: i64, village: i64, payload: &str) -> Caravan {
        Caravan {
            id: CaravanId(id),
            start_time: Utc::now(),
            travel_time_ms: 300_000,
            region_id: RegionId(9),
            village_id: VillageId(village),
            kind: CaravanKind::Resource,
            resources: payload.to_owned(),
            name: format!("Village {village} Caravan"),
        }
    }

    fn world(caravans: Vec<Caravan>) -> WorldState {
        WorldState::from_parts(
            vec![village(1), village(2)],
            vec![region(3, 1, 1), region(9, 2, 2)],
            vec![
                location(1, 9, LocationType::Castle, 2, ResourceKind::Materials, 26),
                location(2, 9, LocationType::Village, 2, ResourceKind::Food, 9),
                location(3, 9, LocationType::Village, 1, ResourceKind::Food, 0),
                location(4, 3, LocationType::Castle, 1, ResourceKind::Wealth, 50),
            ],
            Vec::new(),
            caravans,
        )
        .unwrap()
    }

    #[test]
    fn settlement_credits_cargo_and_removes_caravans() {
        let mut w = world(vec![
            caravan(1, 1, r#"{"1":10}"#),
            caravan(2, 1, r#"{"1":5,"2":3}"#),
        ]);
        let mut batch = MutationBatch::new();
        let mut issues = Vec::new();

        let settled = settle_caravans(&mut w, &mut batch, &mut issues).unwrap();

        assert_eq!(settled, 2);
        assert!(issues.is_empty());
        assert_eq!(w.caravan_count(), 0);
        let v = w.village(VillageId(1)).unwrap();
        assert_eq!(v.resources.get(ResourceKind::Materials), 15);
        assert_eq!(v.resources.get(ResourceKind::Food), 3);
        assert_eq!(batch.count_of("delete_caravan"), 2);
        assert_eq!(batch.count_of("village_resources"), 1);
    }

    #[test]
    fn malformed_caravan_is_reported_and_removed_without_credit() {
        let mut w = world(vec![caravan(1, 1, "{broken"), caravan(2, 2, r#"{"3":4}"#)]);
        let mut batch = MutationBatch::new();
        let mut issues = Vec::new();

        let settled = settle_caravans(&mut w, &mut batch, &mut issues).unwrap();

        assert_eq!(settled, 1);
        assert_eq!(w.caravan_count(), 0);
        assert_eq!(batch.count_of("delete_caravan"), 2);
        assert_eq!(batch.count_of("village_resources"), 1);
        assert!(w.village(VillageId(1)).unwrap().resources.is_empty());
        assert!(matches!(
            issues.as_slice(),
            [TickIssue::MalformedCaravan {
                caravan: CaravanId(1),
                ..
            }]
        ));
        assert_eq!(
            w.village(VillageId(2)).unwrap().resources.get(ResourceKind::Wealth),
            4
        );
    }

    #[test]
    fn supply_caravans_are_removed_without_credit() {
        let mut w = world(vec![supply(1, 1), caravan(2, 1, r#"{"1":6}"#)]);
        let mut batch = MutationBatch::new();
        let mut issues = Vec::new();

        let settled = settle_caravans(&mut w, &mut batch, &mut issues).unwrap();

        assert_eq!(settled, 1);
        assert!(issues.is_empty());
        assert_eq!(w.caravan_count(), 0);
        let v = w.village(VillageId(1)).unwrap();
        assert_eq!(v.resources.get(ResourceKind::Materials), 6);
        assert_eq!(v.resources.get(ResourceKind::Food), 0);
        assert_eq!(batch.count_of("delete_caravan"), 2);
    }

    #[test]
    fn region_with_nothing_accrued_still_gets_a_caravan() {
        let mut w = WorldState::from_parts(
            vec![village(1), village(2)],
            vec![region(3, 1, 1), region(9, 2, 2), region(11, 1, 2)],
            vec![
                location(1, 9, LocationType::Castle, 2, ResourceKind::Materials, 0),
                location(2, 11, LocationType::Castle, 1, ResourceKind::Food, 4),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut batch = MutationBatch::new();

        let created = generate_caravans(
            &mut w,
            &HegemonConfig::default(),
            &mut rng,
            Utc::now(),
            &mut batch,
        )
        .unwrap();

        assert_eq!(created, 2);
        let payloads: Vec<(RegionId, String)> = batch
            .iter()
            .filter_map(|m| match m {
                Mutation::InsertCaravan(c) => Some((c.region_id, c.resources.to_payload())),
                _ => None,
            })
            .collect();
        assert_eq!(
            payloads,
            vec![
                (RegionId(9), "{}".to_owned()),
                (RegionId(11), r#"{"2":4}"#.to_owned())
            ]
        );
        assert_eq!(batch.count_of("location_resource_count"), 1);
    }

    #[test]
    fn generation_drains_non_home_regions_into_one_caravan() {
        let mut w = world(Vec::new());
        let config = HegemonConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let mut batch = MutationBatch::new();

        let created = generate_caravans(&mut w, &config, &mut rng, now, &mut batch).unwrap();

        assert_eq!(created, 1);
        let inserted: Vec<&NewCaravan> = batch
            .iter()
            .filter_map(|m| match m {
                Mutation::InsertCaravan(c) => Some(c),
                _ => None,
            })
            .collect();
        let new = inserted.first().unwrap();
        assert_eq!(new.region_id, RegionId(9));
        assert_eq!(new.village_id, VillageId(2));
        assert_eq!(new.name, "Village 2 Caravan");
        assert_eq!(new.resources.get(ResourceKind::Materials), 26);
        assert_eq!(new.resources.get(ResourceKind::Food), 9);

        let latest = now + Duration::milliseconds(21_600_000 - 300_000);
        assert!(new.start_time >= now && new.start_time <= latest);

        assert_eq!(w.location(RegionLocationId(1)).unwrap().resource_count, 0);
        assert_eq!(w.location(RegionLocationId(2)).unwrap().resource_count, 0);
        // Home region 3 is never drained.
        assert_eq!(w.location(RegionLocationId(4)).unwrap().resource_count, 50);
        assert_eq!(batch.count_of("location_resource_count"), 2);
        assert_eq!(batch.count_of("region_location"), 0);
    }

    #[test]
    fn empty_world_cycle_changes_nothing() {
        let mut w = WorldState::from_parts(
            vec![village(1)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let before = w.clone();
        let mut rng = StdRng::seed_from_u64(1);

        let outcome =
            caravan_cycle(&mut w, &HegemonConfig::default(), &mut rng, Utc::now()).unwrap();

        assert!(outcome.batch.is_empty());
        assert_eq!(w, before);
    }

    #[test]
    fn departure_window_leaves_room_to_arrive() {
        assert_eq!(
            departure_window_ms(&WorldConfig::default()),
            21_600_000 - 300_000
        );
    }
}
