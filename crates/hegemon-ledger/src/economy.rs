//! Village economy phases: upkeep, excess decay, and base production.
//!
//! Each function mutates one village's balances in place and appends the
//! matching entries to a [`ResourceLog`]. Balances never go negative: all
//! debits go through [`ResourceBundle::subtract`], which clamps at zero.
//! Callers must not assume a debit was applied in full.
//!
//! Decay math uses [`Decimal`] and rounds exactly once, up, per resource
//! kind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::trace;

use hegemon_types::{ResourceBundle, ResourceKind, Village};

use crate::LedgerError;
use crate::ledger::ResourceLog;

/// Hours per day times percent, for converting the daily decay percentage.
const PERCENT_HOURS_PER_DAY: u32 = 2400;

/// Convert a daily excess-decay percentage into a per-hour fraction.
///
/// `12` percent per day is `0.005` per hour.
pub fn hourly_decay_rate(percent_per_day: u32) -> Decimal {
    Decimal::from(percent_per_day)
        .checked_div(Decimal::from(PERCENT_HOURS_PER_DAY))
        .unwrap_or(Decimal::ZERO)
}

/// Charge upkeep against a village.
///
/// Logs one `UpgradeUpkeep` entry per resource kind with the requested
/// amount, including zero amounts.
pub fn apply_upkeep(
    village: &mut Village,
    upkeep: &ResourceBundle,
    now: DateTime<Utc>,
    log: &mut ResourceLog,
) {
    for (kind, amount) in upkeep.iter() {
        let removed = village.resources.subtract(kind, amount);
        if removed < amount {
            trace!(village = %village.id, %kind, amount, removed, "Upkeep exceeded balance");
        }
        log.record_upkeep(village.id, kind, amount, now);
    }
}

/// Compute proportional decay of resources held above capacity.
///
/// Returns an empty bundle when `total <= capacity`. Otherwise each kind
/// with count `c` decays by `ceil(excess * rate * c / total)`.
///
/// # Errors
///
/// Returns [`LedgerError::NegativeRate`] for a negative rate and
/// [`LedgerError::Overflow`] if the decimal arithmetic overflows.
pub fn decay_amounts(
    resources: &ResourceBundle,
    capacity: u64,
    rate: Decimal,
) -> Result<ResourceBundle, LedgerError> {
    if rate.is_sign_negative() {
        return Err(LedgerError::NegativeRate { rate });
    }

    let total = resources.total();
    let Some(excess) = total.checked_sub(capacity).filter(|e| *e > 0) else {
        return Ok(ResourceBundle::new());
    };

    let excess_rate = Decimal::from(excess)
        .checked_mul(rate)
        .ok_or(LedgerError::Overflow)?;
    let total = Decimal::from(total);

    let mut decay = ResourceBundle::new();
    for (kind, count) in resources.iter() {
        if count == 0 {
            continue;
        }
        // Divide last so an exact integer result is not perturbed by rounding.
        let amount = excess_rate
            .checked_mul(Decimal::from(count))
            .and_then(|v| v.checked_div(total))
            .ok_or(LedgerError::Overflow)?
            .ceil()
            .to_u64()
            .ok_or(LedgerError::Overflow)?;
        decay.add(kind, amount);
    }
    Ok(decay)
}

/// Apply excess decay to a village.
///
/// Logs one `Decay` entry per resource kind with nonzero decay and returns
/// the computed decay.
///
/// # Errors
///
/// Propagates [`decay_amounts`] errors; the village is untouched on error.
pub fn apply_decay(
    village: &mut Village,
    rate: Decimal,
    now: DateTime<Utc>,
    log: &mut ResourceLog,
) -> Result<ResourceBundle, LedgerError> {
    let decay = decay_amounts(&village.resources, village.resource_capacity, rate)?;
    for (kind, amount) in decay.iter() {
        if amount == 0 {
            continue;
        }
        village.resources.subtract(kind, amount);
        log.record_decay(village.id, kind, amount, now);
    }
    Ok(decay)
}

/// Hourly base production of a village.
///
/// Policy production plus the summed production effect of the village's
/// effect-granting upgrades, floored at zero per resource kind.
pub fn base_production(village: &Village) -> ResourceBundle {
    ResourceBundle::from_pairs(ResourceKind::ALL.into_iter().map(|kind| {
        let policy = i64::try_from(village.policy.production.get(kind)).unwrap_or(i64::MAX);
        let total = policy.saturating_add(village.effect(kind.production_effect()));
        (kind, u64::try_from(total).unwrap_or(0))
    }))
}

/// Credit base production to a village.
///
/// Logs a `Production` and a `Collection` entry with the same quantity for
/// every resource kind.
pub fn apply_base_production(
    village: &mut Village,
    now: DateTime<Utc>,
    log: &mut ResourceLog,
) -> ResourceBundle {
    let production = base_production(village);
    for (kind, amount) in production.iter() {
        village.resources.add(kind, amount);
        log.record_production(village.id, kind, amount, now);
        log.record_collection(village.id, kind, amount, now);
    }
    production
}

/// Credit a bundle of cargo to a village without logging.
pub fn credit_bundle(village: &mut Village, cargo: &ResourceBundle) {
    for (kind, amount) in cargo.iter() {
        village.resources.add(kind, amount);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use hegemon_types::{Policy, ResourceLogType, UpgradeEffect, VillageId};

    use super::*;

    fn make_village(resources: ResourceBundle, capacity: u64) -> Village {
        Village {
            id: VillageId(1),
            name: "Stonehold".to_owned(),
            resources,
            resource_capacity: capacity,
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

    fn bundle(materials: u64, food: u64, wealth: u64) -> ResourceBundle {
        ResourceBundle::from_pairs([
            (ResourceKind::Materials, materials),
            (ResourceKind::Food, food),
            (ResourceKind::Wealth, wealth),
        ])
    }

    #[test]
    fn hourly_rate_from_daily_percent() {
        assert_eq!(hourly_decay_rate(12), Decimal::new(5, 3));
    }

    #[test]
    fn upkeep_clamps_and_logs_every_kind() {
        let mut village = make_village(bundle(3, 10, 0), 1000);
        let mut log = ResourceLog::new();
        apply_upkeep(&mut village, &bundle(5, 4, 0), Utc::now(), &mut log);

        assert_eq!(village.resources.get(ResourceKind::Materials), 0);
        assert_eq!(village.resources.get(ResourceKind::Food), 6);
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.total(VillageId(1), ResourceKind::Materials, ResourceLogType::UpgradeUpkeep),
            5
        );
    }

    #[test]
    fn no_decay_at_or_below_capacity() {
        let decay = decay_amounts(&bundle(50, 50, 0), 100, hourly_decay_rate(12)).unwrap();
        assert!(decay.is_empty());
        let decay = decay_amounts(&bundle(10, 0, 0), 100, hourly_decay_rate(12)).unwrap();
        assert!(decay.is_empty());
    }

    #[test]
    fn decay_is_proportional_and_rounded_up() {
        // total 160, capacity 100, excess 60, 0.5%/h: 60 * 0.005 * 0.5 = 0.15 -> 1 each.
        let decay = decay_amounts(&bundle(80, 80, 0), 100, hourly_decay_rate(12)).unwrap();
        assert_eq!(decay.get(ResourceKind::Materials), 1);
        assert_eq!(decay.get(ResourceKind::Food), 1);
        assert_eq!(decay.get(ResourceKind::Wealth), 0);
    }

    #[test]
    fn decay_follows_each_share() {
        // excess 9000 at 10%: 900 split 3:1 by share.
        let rate = Decimal::new(1, 1);
        let decay = decay_amounts(&bundle(7500, 2500, 0), 1000, rate).unwrap();
        assert_eq!(decay.get(ResourceKind::Materials), 675);
        assert_eq!(decay.get(ResourceKind::Food), 225);
    }

    #[test]
    fn decay_sum_stays_within_rounding_bound() {
        let rate = hourly_decay_rate(12);
        for (m, f, w, cap) in [(80, 80, 0, 100), (1, 1, 1, 0), (999, 17, 3, 10), (5, 5, 5, 14)] {
            let resources = bundle(m, f, w);
            let excess = resources.total().saturating_sub(cap);
            let decay = decay_amounts(&resources, cap, rate).unwrap();
            let exact_ceiling = Decimal::from(excess)
                .checked_mul(rate)
                .unwrap()
                .ceil()
                .to_u64()
                .unwrap();
            assert!(decay.total() <= exact_ceiling.saturating_add(2));
            assert!(decay.total() <= excess.max(1).saturating_add(2));
        }
    }

    #[test]
    fn negative_rate_is_rejected() {
        let result = decay_amounts(&bundle(10, 0, 0), 0, Decimal::NEGATIVE_ONE);
        assert!(matches!(result, Err(LedgerError::NegativeRate { .. })));
    }

    #[test]
    fn apply_decay_logs_only_nonzero_kinds() {
        let mut village = make_village(bundle(80, 80, 0), 100);
        let mut log = ResourceLog::new();
        apply_decay(&mut village, hourly_decay_rate(12), Utc::now(), &mut log).unwrap();
        assert_eq!(village.resources.get(ResourceKind::Materials), 79);
        assert_eq!(village.resources.get(ResourceKind::Food), 79);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn base_production_adds_policy_and_effects() {
        let mut village = make_village(bundle(0, 0, 0), 1000);
        village.policy.production = bundle(10, 20, 5);
        village
            .active_effects
            .insert(UpgradeEffect::FoodProduction, 7);
        village
            .active_effects
            .insert(UpgradeEffect::WealthProduction, -9);

        let mut log = ResourceLog::new();
        let produced = apply_base_production(&mut village, Utc::now(), &mut log);

        assert_eq!(produced, bundle(10, 27, 0));
        assert_eq!(village.resources, bundle(10, 27, 0));
        assert_eq!(log.len(), 6);
        assert_eq!(
            log.total(VillageId(1), ResourceKind::Food, ResourceLogType::Collection),
            27
        );
        assert_eq!(
            log.total(VillageId(1), ResourceKind::Food, ResourceLogType::Production),
            27
        );
    }

    #[test]
    fn credit_bundle_adds_each_kind() {
        let mut village = make_village(bundle(1, 1, 1), 1000);
        credit_bundle(&mut village, &bundle(10, 0, 3));
        assert_eq!(village.resources, bundle(11, 1, 4));
    }
}
