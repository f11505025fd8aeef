//! The hourly stability and production tick.
//!
//! Phases run in a fixed order over one working set, each reading what the
//! previous one wrote:
//!
//! 1. refresh upgrade effects from the catalog
//! 2. research and construction progress
//! 3. upkeep for upgrades that were `ACTIVE` when the tick began
//! 4. excess decay
//! 5. war victory evaluation
//! 6. base production
//! 7. territorial convergence, bypass collection, and location accrual
//! 8. production log per region owner
//!
//! The writes are then assembled into one batch: progress and victory
//! writes first, then locations, village balances, and the resource log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use hegemon_ledger::{ResourceLog, apply_base_production, apply_decay, apply_upkeep};
use hegemon_types::{ResourceBundle, ResourceKind, UpgradeId, UpgradeStatus, Village, VillageId};
use hegemon_world::{TerritoryRules, WorldState, converge_region};

use crate::catalog::{Catalog, CatalogError};
use crate::config::HegemonConfig;
use crate::mutation::{Mutation, MutationBatch};
use crate::progress::resolve_progress;
use crate::scores::CatalogScores;
use crate::tick::{TickError, TickIssue, TickOutcome};
use crate::war::VictoryEvaluator;

/// Production attributed to each region owner, per resource kind.
pub type ProductionTotals = BTreeMap<(VillageId, ResourceKind), u64>;

/// Recompute every village's effect totals from its upgrades.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownUpgrade`] for an effect-granting upgrade
/// missing from the catalog.
pub fn refresh_effects(world: &mut WorldState, catalog: &Catalog) -> Result<(), CatalogError> {
    for village in world.villages_mut() {
        let effects = catalog.active_effects(village)?;
        village.active_effects = effects;
    }
    Ok(())
}

/// Summed upkeep of a village's upgrades that are `ACTIVE` and were not
/// activated this tick.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownUpgrade`] for an active upgrade missing
/// from the catalog.
pub fn upkeep_due(
    village: &Village,
    catalog: &Catalog,
    activated: &BTreeSet<UpgradeId>,
) -> Result<ResourceBundle, CatalogError> {
    let mut due = ResourceBundle::new();
    for upgrade in &village.upgrades {
        if upgrade.status != UpgradeStatus::Active || activated.contains(&upgrade.id) {
            continue;
        }
        for (kind, amount) in catalog.upgrade(&upgrade.key)?.upkeep.iter() {
            due.add(kind, amount);
        }
    }
    Ok(due)
}

/// Hand every active war to the evaluator and collect its writes.
///
/// A failed evaluation is recorded as an issue; the remaining wars are
/// still evaluated.
pub fn evaluate_wars(
    world: &WorldState,
    victory: &impl VictoryEvaluator,
    now: DateTime<Utc>,
    batch: &mut MutationBatch,
    issues: &mut Vec<TickIssue>,
) {
    let wars = world.active_wars();
    let mut writes = 0_usize;
    for war in &wars {
        match victory.evaluate(war, world, now) {
            Ok(mutations) => {
                writes = writes.saturating_add(mutations.len());
                batch.extend(mutations);
            }
            Err(e) => issues.push(TickIssue::WarEvaluation {
                relation: war.id,
                reason: e.to_string(),
            }),
        }
    }
    debug!(wars = wars.len(), writes, "Wars evaluated");
}

/// Converge every region and settle location yields.
///
/// For each location, after convergence: if the region is a home region or
/// its owner does not occupy the location, the count accrued so far is
/// credited to the region owner and logged as a collection against the
/// occupant, and the count restarts from zero. Every location then adds
/// this tick's production to its count. All production is totalled per
/// region owner for the production log.
///
/// # Errors
///
/// Returns [`TickError::World`] if a region, location, or village does not
/// resolve.
pub fn settle_territory(
    world: &mut WorldState,
    rules: &TerritoryRules,
    now: DateTime<Utc>,
    log: &mut ResourceLog,
) -> Result<ProductionTotals, TickError> {
    let mut totals = ProductionTotals::new();
    let mut collected_total = 0_u64;

    for region_id in world.region_ids() {
        let yields = converge_region(world, region_id, rules)?;
        let owner = world.region(region_id)?.village_id;
        let home = rules.is_home_region(region_id);

        for site in yields {
            let location = world.location_mut(site.location_id)?;
            let occupant = location.occupying_village_id;
            let bypass = home || occupant != Some(owner);
            let collected = if bypass {
                core::mem::take(&mut location.resource_count)
            } else {
                0
            };
            location.resource_count = location.resource_count.saturating_add(site.produced);

            if bypass {
                world.village_mut(owner)?.resources.add(site.resource, collected);
                log.record_collection(occupant.unwrap_or(owner), site.resource, collected, now);
                collected_total = collected_total.saturating_add(collected);
            }

            let slot = totals.entry((owner, site.resource)).or_insert(0);
            *slot = slot.saturating_add(site.produced);
        }
    }

    debug!(
        regions = world.region_ids().len(),
        collected = collected_total,
        "Territory settled"
    );
    Ok(totals)
}

/// Run every hourly phase over the working set.
///
/// # Errors
///
/// Returns a [`TickError`] for any failure that must abort the run.
pub fn hourly_tick(
    world: &mut WorldState,
    config: &HegemonConfig,
    victory: &impl VictoryEvaluator,
    now: DateTime<Utc>,
) -> Result<TickOutcome, TickError> {
    let catalog = &config.catalog;
    let rules = config.territory_rules();
    let decay_rate = config.economy.hourly_decay_rate();
    let mut log = ResourceLog::new();
    let mut outcome = TickOutcome::default();

    // --- Effects and progress ---
    refresh_effects(world, catalog)?;
    let progress = resolve_progress(world, catalog, &CatalogScores::new(catalog), now)?;
    outcome.batch.extend(progress.mutations);
    outcome.issues.extend(progress.issues);

    // --- Upkeep and decay ---
    for village in world.villages_mut() {
        let due = upkeep_due(village, catalog, &progress.activated)?;
        apply_upkeep(village, &due, now, &mut log);
    }
    for village in world.villages_mut() {
        apply_decay(village, decay_rate, now, &mut log)?;
    }
    debug!(entries = log.len(), "Upkeep and decay applied");

    // --- Wars ---
    evaluate_wars(world, victory, now, &mut outcome.batch, &mut outcome.issues);

    // --- Base production ---
    for village in world.villages_mut() {
        apply_base_production(village, now, &mut log);
    }

    // --- Territory ---
    let totals = settle_territory(world, &rules, now, &mut log)?;
    for ((village_id, resource), quantity) in &totals {
        log.record_production(*village_id, *resource, *quantity, now);
    }

    // --- Assemble ---
    for location in world.locations() {
        outcome.batch.push(Mutation::region_location(location));
    }
    for village in world.villages() {
        outcome.batch.push(Mutation::village_resources(village));
    }
    let log_entries = log.len();
    outcome
        .batch
        .extend(log.into_entries().into_iter().map(Mutation::ResourceLog));

    info!(
        villages = world.village_count(),
        log_entries,
        mutations = outcome.batch.len(),
        issues = outcome.issues.len(),
        "Hourly tick computed"
    );
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hegemon_types::{
        LocationType, RegionId, RegionLocationId, Relation, RelationId, RelationKind,
        ResourceLogType,
    };

    use super::*;
    use crate::testing::{location, region, sample_catalog, upgrade, village};
    use crate::war::{NoVictory, VictoryError};

    fn config() -> HegemonConfig {
        HegemonConfig {
            catalog: sample_catalog(),
            ..HegemonConfig::default()
        }
    }

    fn logged(batch: &MutationBatch, village: i64, kind: ResourceLogType) -> Vec<u64> {
        batch
            .iter()
            .filter_map(|m| match m {
                Mutation::ResourceLog(e) if e.village_id == VillageId(village) && e.log_type == kind => {
                    Some(e.quantity)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn upkeep_skips_upgrades_activated_this_tick() {
        let catalog = sample_catalog();
        let mut v = village(1);
        v.upgrades = vec![
            upgrade(1, 1, "granary", UpgradeStatus::Active),
            upgrade(2, 1, "quarry", UpgradeStatus::Active),
            upgrade(3, 1, "granary", UpgradeStatus::Inactive),
        ];
        let activated = BTreeSet::from([UpgradeId(2)]);
        let due = upkeep_due(&v, &catalog, &activated).unwrap();
        assert_eq!(due, ResourceBundle::from_pairs([(ResourceKind::Food, 5)]));
    }

    #[test]
    fn upkeep_is_logged_for_every_kind_even_at_zero() {
        let mut world = WorldState::from_parts(
            vec![village(1)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let outcome = hourly_tick(&mut world, &config(), &NoVictory::new(), Utc::now()).unwrap();
        assert_eq!(
            logged(&outcome.batch, 1, ResourceLogType::UpgradeUpkeep),
            vec![0, 0, 0]
        );
        assert!(logged(&outcome.batch, 1, ResourceLogType::Decay).is_empty());
    }

    #[test]
    fn active_upgrade_effects_feed_base_production() {
        let mut v = village(1);
        v.resources = ResourceBundle::from_pairs([(ResourceKind::Food, 20)]);
        v.upgrades = vec![upgrade(1, 1, "granary", UpgradeStatus::Active)];
        let mut world =
            WorldState::from_parts(vec![v], Vec::new(), Vec::new(), Vec::new(), Vec::new())
                .unwrap();

        hourly_tick(&mut world, &config(), &NoVictory::new(), Utc::now()).unwrap();

        // 20 - 5 upkeep + 4 production
        let village = world.village(VillageId(1)).unwrap();
        assert_eq!(village.resources.get(ResourceKind::Food), 19);
        assert_eq!(village.effect(hegemon_types::UpgradeEffect::FoodProduction), 4);
    }

    #[test]
    fn occupied_location_is_collected_for_the_owner_and_logged_to_the_occupant() {
        let mut world = WorldState::from_parts(
            vec![village(1), village(2)],
            vec![region(9, 1, 1)],
            vec![
                location(1, 9, LocationType::Castle, 1, ResourceKind::Wealth, 30),
                location(2, 9, LocationType::Village, 2, ResourceKind::Food, 12),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let rules = config().territory_rules();
        let mut log = ResourceLog::new();

        let totals = settle_territory(&mut world, &rules, Utc::now(), &mut log).unwrap();

        // Castle held by the owner keeps accruing for caravans.
        let castle = world.location(RegionLocationId(1)).unwrap();
        assert!(castle.resource_count > 30);
        // Town held by village 2 is collected for village 1.
        let town = world.location(RegionLocationId(2)).unwrap();
        let town_yield = town.resource_count;
        assert_eq!(
            world.village(VillageId(1)).unwrap().resources.get(ResourceKind::Food),
            12
        );
        let collection: Vec<_> = log
            .entries()
            .iter()
            .filter(|e| e.log_type == ResourceLogType::Collection)
            .collect();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.first().map(|e| e.village_id), Some(VillageId(2)));
        assert_eq!(collection.first().map(|e| e.quantity), Some(12));
        assert_eq!(
            totals.get(&(VillageId(1), ResourceKind::Food)).copied(),
            Some(town_yield)
        );
        assert!(totals.keys().all(|(owner, _)| *owner == VillageId(1)));
    }

    #[test]
    fn home_region_collects_everything() {
        let mut world = WorldState::from_parts(
            vec![village(1)],
            vec![region(2, 1, 1)],
            vec![location(1, 2, LocationType::Castle, 1, ResourceKind::Materials, 40)],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let rules = config().territory_rules();
        assert!(rules.is_home_region(RegionId(2)));
        let mut log = ResourceLog::new();

        settle_territory(&mut world, &rules, Utc::now(), &mut log).unwrap();

        assert_eq!(
            world
                .village(VillageId(1))
                .unwrap()
                .resources
                .get(ResourceKind::Materials),
            40
        );
    }

    struct FailingVictory;

    impl VictoryEvaluator for FailingVictory {
        fn evaluate(
            &self,
            war: &Relation,
            _world: &WorldState,
            _now: DateTime<Utc>,
        ) -> Result<Vec<Mutation>, VictoryError> {
            Err(VictoryError::Unresolvable {
                relation: war.id,
                reason: "front line unknown".to_owned(),
            })
        }
    }

    #[test]
    fn failed_war_evaluation_is_reported_not_fatal() {
        let war = Relation {
            id: RelationId(3),
            village1_id: VillageId(1),
            village2_id: VillageId(2),
            kind: RelationKind::War,
            relation_start: Utc::now(),
            relation_end: None,
        };
        let mut world = WorldState::from_parts(
            vec![village(1), village(2)],
            Vec::new(),
            Vec::new(),
            vec![war],
            Vec::new(),
        )
        .unwrap();

        let outcome = hourly_tick(&mut world, &config(), &FailingVictory, Utc::now()).unwrap();

        assert_eq!(outcome.issues.len(), 1);
        assert!(matches!(
            outcome.issues.first(),
            Some(TickIssue::WarEvaluation {
                relation: RelationId(3),
                ..
            })
        ));
        assert_eq!(outcome.batch.count_of("village_resources"), 2);
    }
}
