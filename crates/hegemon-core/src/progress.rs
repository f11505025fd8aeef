//! Research and construction progress.
//!
//! Every upgrade in `RESEARCHING` or `ACTIVATING` and every building in
//! `UPGRADING` advances by `elapsed_seconds * speed` since its last update.
//! Elapsed time is not capped, so a late run catches up in full. When
//! progress strictly exceeds the requirement the entity transitions:
//!
//! | From | To |
//! |------|----|
//! | `RESEARCHING`, upkeep-free | `UNLOCKED` |
//! | `RESEARCHING`, with upkeep | `INACTIVE` |
//! | `ACTIVATING` | `ACTIVE` |
//! | `UPGRADING` tier `n` | `DEFAULT` tier `n + 1`, full health |
//!
//! Completed research and construction recompute the owning village's
//! scores through a [`ScoreCalculator`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use hegemon_types::{Building, BuildingStatus, Upgrade, UpgradeId, UpgradeStatus};
use hegemon_world::WorldState;

use crate::catalog::Catalog;
use crate::mutation::Mutation;
use crate::scores::ScoreCalculator;
use crate::tick::{TickError, TickIssue};

/// What the progress phase changed.
#[derive(Debug, Default)]
pub struct ProgressReport {
    /// Writes for every advanced upgrade, building, and rescored village.
    pub mutations: Vec<Mutation>,
    /// Upgrades that became `ACTIVE` during this phase.
    pub activated: BTreeSet<UpgradeId>,
    /// Entities that could not be advanced.
    pub issues: Vec<TickIssue>,
    /// Number of research or activation completions.
    pub upgrades_completed: usize,
    /// Number of construction completions.
    pub buildings_completed: usize,
}

/// Whole seconds from `last` to `now`, zero when unknown or negative.
fn elapsed_secs(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    last.map_or(0, |t| now.signed_duration_since(t).num_seconds().max(0))
}

fn advance(progress: Option<Decimal>, elapsed: i64, speed: Decimal) -> Option<Decimal> {
    Decimal::from(elapsed)
        .checked_mul(speed)
        .and_then(|delta| progress.unwrap_or(Decimal::ZERO).checked_add(delta))
}

enum Step {
    Skipped,
    Advanced,
    Completed,
}

fn advance_upgrade(
    upgrade: &mut Upgrade,
    speed: Decimal,
    catalog: &Catalog,
    now: DateTime<Utc>,
    issues: &mut Vec<TickIssue>,
) -> Result<Step, TickError> {
    if !upgrade.status.is_in_progress() {
        return Ok(Step::Skipped);
    }
    let Some(required) = upgrade.research_progress_required else {
        issues.push(TickIssue::MissingRequirement {
            entity: "upgrade",
            id: upgrade.id.into_inner(),
        });
        return Ok(Step::Skipped);
    };
    let elapsed = elapsed_secs(upgrade.research_progress_last_updated, now);
    let Some(progress) = advance(upgrade.research_progress, elapsed, speed) else {
        issues.push(TickIssue::ProgressOverflow {
            entity: "upgrade",
            id: upgrade.id.into_inner(),
        });
        return Ok(Step::Skipped);
    };

    upgrade.research_progress_last_updated = Some(now);
    if progress <= required {
        upgrade.research_progress = Some(progress);
        return Ok(Step::Advanced);
    }

    upgrade.status = match upgrade.status {
        UpgradeStatus::Researching if catalog.is_upkeep_free(&upgrade.key)? => {
            UpgradeStatus::Unlocked
        }
        UpgradeStatus::Researching => UpgradeStatus::Inactive,
        _ => UpgradeStatus::Active,
    };
    upgrade.research_progress = None;
    upgrade.research_progress_required = None;
    upgrade.research_boosted = false;
    Ok(Step::Completed)
}

fn advance_building(
    building: &mut Building,
    speed: Decimal,
    catalog: &Catalog,
    now: DateTime<Utc>,
    issues: &mut Vec<TickIssue>,
) -> Result<Step, TickError> {
    if building.status != BuildingStatus::Upgrading {
        return Ok(Step::Skipped);
    }
    let Some(required) = building.construction_progress_required else {
        issues.push(TickIssue::MissingRequirement {
            entity: "building",
            id: building.id.into_inner(),
        });
        return Ok(Step::Skipped);
    };
    let elapsed = elapsed_secs(building.construction_progress_last_updated, now);
    let Some(progress) = advance(building.construction_progress, elapsed, speed) else {
        issues.push(TickIssue::ProgressOverflow {
            entity: "building",
            id: building.id.into_inner(),
        });
        return Ok(Step::Skipped);
    };

    building.construction_progress_last_updated = Some(now);
    if progress <= required {
        building.construction_progress = Some(progress);
        return Ok(Step::Advanced);
    }

    let tier = building.tier.saturating_add(1);
    building.health = catalog.max_health(&building.key, tier)?;
    building.tier = tier;
    building.status = BuildingStatus::Default;
    building.construction_progress = Some(Decimal::ZERO);
    building.construction_progress_required = None;
    building.construction_boosted = false;
    Ok(Step::Completed)
}

/// Advance every in-progress upgrade and building in the world.
///
/// Entities missing a requirement, or whose progress overflows, are left
/// untouched and reported as issues.
///
/// # Errors
///
/// Returns [`TickError::Catalog`] if a completing entity's key or new tier
/// is not in the catalog, or [`TickError::Score`] if rescoring fails.
pub fn resolve_progress(
    world: &mut WorldState,
    catalog: &Catalog,
    scores: &impl ScoreCalculator,
    now: DateTime<Utc>,
) -> Result<ProgressReport, TickError> {
    let mut report = ProgressReport::default();

    for village in world.villages_mut() {
        let research_speed = village.research_speed;
        let construction_speed = village.construction_speed;
        let mut research_done = false;
        let mut construction_done = false;

        for upgrade in &mut village.upgrades {
            let was_activating = upgrade.status == UpgradeStatus::Activating;
            match advance_upgrade(upgrade, research_speed, catalog, now, &mut report.issues)? {
                Step::Skipped => continue,
                Step::Advanced => {}
                Step::Completed => {
                    report.upgrades_completed = report.upgrades_completed.saturating_add(1);
                    if was_activating {
                        report.activated.insert(upgrade.id);
                    } else {
                        research_done = true;
                    }
                    debug!(
                        village = %upgrade.village_id,
                        upgrade = %upgrade.id,
                        key = %upgrade.key,
                        status = upgrade.status.as_str(),
                        "Upgrade completed"
                    );
                }
            }
            report.mutations.push(Mutation::Upgrade(upgrade.clone()));
        }

        for building in &mut village.buildings {
            match advance_building(building, construction_speed, catalog, now, &mut report.issues)?
            {
                Step::Skipped => continue,
                Step::Advanced => {}
                Step::Completed => {
                    report.buildings_completed = report.buildings_completed.saturating_add(1);
                    construction_done = true;
                    debug!(
                        village = %building.village_id,
                        building = %building.id,
                        key = %building.key,
                        tier = building.tier,
                        "Building completed"
                    );
                }
            }
            report.mutations.push(Mutation::Building(building.clone()));
        }

        if research_done {
            village.research_score = scores.research_score(village)?;
        }
        if construction_done {
            village.construction_score = scores.construction_score(village)?;
        }
        if research_done || construction_done {
            report.mutations.push(Mutation::village_scores(village));
        }
    }

    info!(
        writes = report.mutations.len(),
        upgrades_completed = report.upgrades_completed,
        buildings_completed = report.buildings_completed,
        activated = report.activated.len(),
        issues = report.issues.len(),
        "Progress phase complete"
    );
    Ok(report)
}
