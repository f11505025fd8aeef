//! Territorial convergence: stability, defense, and location production.
//!
//! Stability and defense are not state machines but continuous values that
//! move toward a target each tick. Both use the same self-damping shift:
//!
//! ```text
//! gap   = |target - current|
//! shift = min(base_shift + floor(gap / increment), max_shift)
//! ```
//!
//! and never overshoot the target. Within one region the order is fixed:
//! castle stability, then town stability (which reads the castle's new
//! value), then production, then defense.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hegemon_types::{
    LocationType, RegionId, RegionLocationId, ResourceKind, UpgradeEffect, Village, VillageId,
};

use crate::error::WorldError;
use crate::state::WorldState;

/// Lower bound of a location's defense.
pub const MIN_DEFENSE: i32 = 0;

/// Upper bound of a location's defense.
pub const MAX_DEFENSE: i32 = 100;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Parameters of the shared shift formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRule {
    /// Minimum movement per tick while away from the target.
    pub base_shift: i32,
    /// Gap size that earns one extra unit of movement.
    pub increment: i32,
    /// Upper bound on movement per tick.
    pub max_shift: i32,
}

/// Constants governing territorial convergence and location production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryRules {
    /// Regions with an id at or below this value are home regions.
    pub home_region_max_id: i64,
    /// Stability baseline of a castle before modifiers.
    pub base_castle_stability: i32,
    /// Stability baseline of a town before modifiers.
    pub base_town_stability: i32,
    /// Added to town baselines in regions below `home_region_max_id`.
    pub home_region_bonus: i32,
    /// Subtracted from town baselines held by a non-native village.
    pub occupied_penalty: i32,
    /// Shift applied to stability.
    pub stability_shift: ShiftRule,
    /// Shift applied to defense.
    pub defense_shift: ShiftRule,
    /// Hourly production of a castle at zero stability.
    pub castle_production: u64,
    /// Hourly production of a town at zero stability.
    pub town_production: u64,
}

impl TerritoryRules {
    /// Whether a region is a home region: its yields bypass caravans and
    /// it gets no caravan.
    pub const fn is_home_region(&self, region: RegionId) -> bool {
        region.into_inner() <= self.home_region_max_id
    }

    /// Whether towns in a region earn `home_region_bonus`.
    ///
    /// Strictly below the threshold, so the last home region gets the
    /// bypass but not the bonus.
    pub const fn earns_home_bonus(&self, region: RegionId) -> bool {
        region.into_inner() < self.home_region_max_id
    }
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Move `current` toward `target` by the rule's shift without overshooting.
pub fn shift_toward(current: i32, target: i32, rule: ShiftRule) -> i32 {
    let gap = i64::from(target).abs_diff(i64::from(current));
    let step = i64::try_from(gap)
        .unwrap_or(i64::MAX)
        .checked_div(i64::from(rule.increment))
        .unwrap_or(0);
    let shift = i64::from(rule.base_shift)
        .saturating_add(step)
        .min(i64::from(rule.max_shift))
        .max(0);
    let shift = i32::try_from(shift).unwrap_or(i32::MAX);

    if current < target {
        current.saturating_add(shift).min(target)
    } else {
        current.saturating_sub(shift).max(target)
    }
}

/// Move defense toward stability, bounded to `[MIN_DEFENSE, MAX_DEFENSE]`.
pub fn converge_defense(defense: i32, stability: i32, rule: ShiftRule) -> i32 {
    shift_toward(defense, stability, rule).clamp(MIN_DEFENSE, MAX_DEFENSE)
}

/// Narrow a wide intermediate value to `i32`, saturating.
fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Stability modifiers an occupant brings to every location it holds.
fn occupant_bonus(occupant: &Village) -> i64 {
    occupant
        .effect(UpgradeEffect::BaseStability)
        .saturating_add(i64::from(occupant.policy.base_stability))
}

/// Stability baseline of a castle held by `occupant`.
pub fn castle_baseline(rules: &TerritoryRules, occupant: &Village) -> i32 {
    saturate(i64::from(rules.base_castle_stability).saturating_add(occupant_bonus(occupant)))
}

/// Inputs to a town's stability baseline beyond its occupant.
#[derive(Debug, Clone, Copy)]
pub struct TownContext<'a> {
    /// Whether the town earns the home-region bonus.
    pub home_bonus: bool,
    /// The region's native village.
    pub native: &'a Village,
    /// The castle's occupant and its already-converged stability.
    pub castle: Option<(VillageId, i32)>,
}

/// Stability baseline of a town held by `occupant`.
pub fn town_baseline(rules: &TerritoryRules, occupant: &Village, ctx: TownContext<'_>) -> i32 {
    let mut baseline =
        i64::from(rules.base_town_stability).saturating_add(occupant_bonus(occupant));
    if ctx.home_bonus {
        baseline = baseline.saturating_add(i64::from(rules.home_region_bonus));
    }
    if let Some((castle_holder, castle_stability)) = ctx.castle {
        if castle_holder == occupant.id {
            baseline = baseline.saturating_add(i64::from(castle_stability));
        }
    }
    if occupant.id != ctx.native.id {
        baseline = baseline
            .saturating_sub(i64::from(rules.occupied_penalty))
            .saturating_sub(ctx.native.effect(UpgradeEffect::OccupiedBaseStabilityReduction));
    }
    saturate(baseline)
}

/// Hourly output of a site: `base * max(1 + stability / 100, 0)`, floored.
pub fn location_production(base: u64, stability: i32) -> u64 {
    let factor = Decimal::ONE
        .checked_add(Decimal::new(i64::from(stability), 2))
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);
    Decimal::from(base)
        .checked_mul(factor)
        .map_or(u64::MAX, |v| v.floor().to_u64().unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Region pass
// ---------------------------------------------------------------------------

/// This tick's output of one location, before collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationYield {
    /// The producing location.
    pub location_id: RegionLocationId,
    /// Resource produced.
    pub resource: ResourceKind,
    /// Quantity produced this tick.
    pub produced: u64,
}

fn occupant_of(world: &WorldState, id: RegionLocationId) -> Result<VillageId, WorldError> {
    world
        .location(id)?
        .occupying_village_id
        .ok_or(WorldError::MissingOccupant(id))
}

/// Converge stability and defense of every location in one region.
///
/// Returns each location's production for this tick, computed from its
/// updated stability. Inert location types keep their stability and
/// defense and produce nothing. Accrual and collection are left to the
/// caller.
///
/// # Errors
///
/// Returns a [`WorldError`] if the region, a location, or an occupant
/// does not resolve.
pub fn converge_region(
    world: &mut WorldState,
    region_id: RegionId,
    rules: &TerritoryRules,
) -> Result<Vec<LocationYield>, WorldError> {
    let native_id = world.region(region_id)?.native_village_id;
    let home_bonus = rules.earns_home_bonus(region_id);
    let ids = world.location_ids_in(region_id);

    // Castle first: towns read its converged stability.
    let mut castle = None;
    if let Some(castle_id) = world.castle_of(region_id).map(|c| c.id) {
        let holder = occupant_of(world, castle_id)?;
        let baseline = castle_baseline(rules, world.village(holder)?);
        let site = world.location_mut(castle_id)?;
        site.stability = shift_toward(site.stability, baseline, rules.stability_shift);
        castle = Some((holder, site.stability));
    }

    for id in &ids {
        if world.location(*id)?.location_type != LocationType::Village {
            continue;
        }
        let holder = occupant_of(world, *id)?;
        let ctx = TownContext {
            home_bonus,
            native: world.village(native_id)?,
            castle,
        };
        let baseline = town_baseline(rules, world.village(holder)?, ctx);
        let site = world.location_mut(*id)?;
        site.stability = shift_toward(site.stability, baseline, rules.stability_shift);
    }

    let mut yields = Vec::with_capacity(ids.len());
    for id in &ids {
        let site = world.location_mut(*id)?;
        let base = match site.location_type {
            LocationType::Castle => rules.castle_production,
            LocationType::Village => rules.town_production,
            LocationType::Other(_) => {
                yields.push(LocationYield {
                    location_id: site.id,
                    resource: site.resource,
                    produced: 0,
                });
                continue;
            }
        };
        yields.push(LocationYield {
            location_id: site.id,
            resource: site.resource,
            produced: location_production(base, site.stability),
        });
        site.defense = converge_defense(site.defense, site.stability, rules.defense_shift);
    }

    debug!(
        region = %region_id,
        locations = ids.len(),
        castle = castle.is_some(),
        "Region converged"
    );
    Ok(yields)
}
