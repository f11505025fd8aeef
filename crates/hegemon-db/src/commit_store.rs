//! Atomic application of a mutation batch.
//!
//! A commit runs in one transaction:
//!
//! ```text
//! BEGIN
//!   LOCK TABLE <world tables>, tick_runs IN EXCLUSIVE MODE
//!   SELECT COUNT(*) FROM tick_runs -- the store version
//!   INSERT INTO tick_runs          -- unique (pipeline, period)
//!   <one statement per mutation, in batch order>
//! COMMIT
//! ```
//!
//! The lock serializes commits of both pipelines; readers are not blocked.
//! A batch holds absolute values computed from its snapshot, so the commit
//! is refused with [`DbError::Stale`] unless the run count still equals
//! the version the snapshot was read at. Any failure drops the transaction,
//! which rolls every statement back.

use sqlx::{PgConnection, PgPool};

use hegemon_core::{Mutation, MutationBatch, TickRun};
use hegemon_types::Pipeline;

use crate::error::DbError;

const LOCK_WORLD: &str = r"LOCK TABLE villages, village_upgrades, village_buildings,
    region_locations, village_relations, caravans, resource_logs, tick_runs
    IN EXCLUSIVE MODE";

fn to_i64(table: &'static str, column: &'static str, value: u64) -> Result<i64, DbError> {
    i64::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Decode {
            table,
            column,
            value: value.to_string(),
        })
}

fn expect_row(table: &'static str, id: i64, rows_affected: u64) -> Result<(), DbError> {
    if rows_affected == 0 {
        return Err(DbError::MissingRow { table, id });
    }
    Ok(())
}

/// Operations on the `tick_runs` table and the batch it guards.
pub struct CommitStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CommitStore<'a> {
    /// Create a new commit store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The highest period committed for `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn last_applied_period(&self, pipeline: Pipeline) -> Result<Option<i64>, DbError> {
        let period = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(period) FROM tick_runs WHERE pipeline = $1",
        )
        .bind(pipeline.as_str())
        .fetch_one(self.pool)
        .await?;
        Ok(period)
    }

    /// Apply `batch`, computed from the snapshot at `version`, and record
    /// `run`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyApplied`] if the run's period is already
    /// recorded, [`DbError::Stale`] if another run committed since
    /// `version`, [`DbError::MissingRow`] if a mutation targets a row that
    /// does not exist, or [`DbError::Postgres`] for any other failure.
    /// Nothing is written in any error case.
    pub async fn apply(
        &self,
        batch: &MutationBatch,
        run: &TickRun,
        version: i64,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(LOCK_WORLD).execute(&mut *tx).await?;
        let current = run_count(&mut *tx).await?;

        let recorded = sqlx::query(
            r"INSERT INTO tick_runs (run_id, pipeline, period, started_at, mutation_count)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(run.id.into_inner())
        .bind(run.pipeline.as_str())
        .bind(run.period)
        .bind(run.started_at)
        .bind(to_i64("tick_runs", "mutation_count", run.mutation_count)?)
        .execute(&mut *tx)
        .await;
        if let Err(sqlx::Error::Database(db_err)) = &recorded
            && db_err.is_unique_violation()
        {
            return Err(DbError::AlreadyApplied {
                pipeline: run.pipeline,
                period: run.period,
            });
        }
        recorded?;

        if current != version {
            tracing::warn!(
                pipeline = run.pipeline.as_str(),
                period = run.period,
                read = version,
                current,
                "World changed since snapshot, refusing commit"
            );
            return Err(DbError::Stale {
                read: version,
                current,
            });
        }

        for mutation in batch.iter() {
            apply_mutation(&mut *tx, mutation).await?;
        }

        tx.commit().await?;

        tracing::info!(
            run_id = %run.id,
            pipeline = run.pipeline.as_str(),
            period = run.period,
            mutations = batch.len(),
            "Committed tick batch"
        );
        Ok(())
    }
}

/// Number of committed runs, the store version snapshots are tagged with.
pub(crate) async fn run_count(conn: &mut PgConnection) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tick_runs")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

#[allow(clippy::too_many_lines)]
async fn apply_mutation(conn: &mut PgConnection, mutation: &Mutation) -> Result<(), DbError> {
    match mutation {
        Mutation::VillageResources {
            village_id,
            resources,
        } => {
            let id = village_id.into_inner();
            let result = sqlx::query("UPDATE villages SET resources = $1 WHERE village_id = $2")
                .bind(resources.to_payload())
                .bind(id)
                .execute(conn)
                .await?;
            expect_row("villages", id, result.rows_affected())
        }
        Mutation::VillageScores {
            village_id,
            research_score,
            construction_score,
        } => {
            let id = village_id.into_inner();
            let result = sqlx::query(
                r"UPDATE villages SET research_score = $1, construction_score = $2
                  WHERE village_id = $3",
            )
            .bind(research_score)
            .bind(construction_score)
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("villages", id, result.rows_affected())
        }
        Mutation::Upgrade(upgrade) => {
            let id = upgrade.id.into_inner();
            let result = sqlx::query(
                r"UPDATE village_upgrades SET status = $1, research_progress = $2,
                      research_progress_required = $3, research_progress_last_updated = $4,
                      research_boosted = $5
                  WHERE village_id = $6 AND id = $7",
            )
            .bind(upgrade.status.as_str())
            .bind(upgrade.research_progress)
            .bind(upgrade.research_progress_required)
            .bind(upgrade.research_progress_last_updated)
            .bind(upgrade.research_boosted)
            .bind(upgrade.village_id.into_inner())
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("village_upgrades", id, result.rows_affected())
        }
        Mutation::Building(building) => {
            let id = building.id.into_inner();
            let tier = i32::try_from(building.tier)
                .ok()
                .ok_or_else(|| DbError::Decode {
                    table: "village_buildings",
                    column: "tier",
                    value: building.tier.to_string(),
                })?;
            let result = sqlx::query(
                r"UPDATE village_buildings SET status = $1, tier = $2, construction_progress = $3,
                      construction_progress_required = $4, construction_progress_last_updated = $5,
                      construction_boosted = $6, health = $7
                  WHERE village_id = $8 AND id = $9",
            )
            .bind(building.status.as_str())
            .bind(tier)
            .bind(building.construction_progress)
            .bind(building.construction_progress_required)
            .bind(building.construction_progress_last_updated)
            .bind(building.construction_boosted)
            .bind(building.health)
            .bind(building.village_id.into_inner())
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("village_buildings", id, result.rows_affected())
        }
        Mutation::RegionLocation {
            location_id,
            resource_count,
            stability,
            defense,
            health,
        } => {
            let id = location_id.into_inner();
            let result = sqlx::query(
                r"UPDATE region_locations SET resource_count = $1, stability = $2,
                      defense = $3, health = $4
                  WHERE region_location_id = $5",
            )
            .bind(to_i64("region_locations", "resource_count", *resource_count)?)
            .bind(stability)
            .bind(defense)
            .bind(health)
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("region_locations", id, result.rows_affected())
        }
        Mutation::LocationResourceCount {
            location_id,
            resource_count,
        } => {
            let id = location_id.into_inner();
            let result = sqlx::query(
                "UPDATE region_locations SET resource_count = $1 WHERE region_location_id = $2",
            )
            .bind(to_i64("region_locations", "resource_count", *resource_count)?)
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("region_locations", id, result.rows_affected())
        }
        Mutation::ResourceLog(entry) => {
            sqlx::query(
                r"INSERT INTO resource_logs (village_id, resource_id, type, quantity, time)
                  VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(entry.village_id.into_inner())
            .bind(entry.resource.code())
            .bind(entry.log_type.code())
            .bind(to_i64("resource_logs", "quantity", entry.quantity)?)
            .bind(entry.logged_at)
            .execute(conn)
            .await?;
            Ok(())
        }
        Mutation::InsertCaravan(caravan) => {
            sqlx::query(
                r"INSERT INTO caravans
                      (start_time, travel_time, region_id, village_id, caravan_type, resources, name)
                  VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(caravan.start_time)
            .bind(caravan.travel_time_ms)
            .bind(caravan.region_id.into_inner())
            .bind(caravan.village_id.into_inner())
            .bind(caravan.kind.code())
            .bind(caravan.resources.to_payload())
            .bind(&caravan.name)
            .execute(conn)
            .await?;
            Ok(())
        }
        Mutation::DeleteCaravan(caravan_id) => {
            let id = caravan_id.into_inner();
            let result = sqlx::query("DELETE FROM caravans WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await?;
            expect_row("caravans", id, result.rows_affected())
        }
        Mutation::EndRelation {
            relation_id,
            ended_at,
        } => {
            let id = relation_id.into_inner();
            let result = sqlx::query(
                "UPDATE village_relations SET relation_end = $1 WHERE relation_id = $2",
            )
            .bind(ended_at)
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("village_relations", id, result.rows_affected())
        }
        Mutation::TransferLocation {
            location_id,
            occupying_village_id,
        } => {
            let id = location_id.into_inner();
            let result = sqlx::query(
                "UPDATE region_locations SET occupying_village_id = $1 WHERE region_location_id = $2",
            )
            .bind(occupying_village_id.into_inner())
            .bind(id)
            .execute(conn)
            .await?;
            expect_row("region_locations", id, result.rows_affected())
        }
    }
}
