//! Snapshot loading: every world row a run reads, assembled into a
//! validated [`WorldState`].
//!
//! The loader reads each table once, in id order, inside one read-only
//! `REPEATABLE READ` transaction, so every table and the run count come
//! from the same database state. The run count is the snapshot's version.
//! Upgrades and buildings are grouped under their village before the world
//! is built, so a row pointing at a missing village surfaces as an
//! integrity error.

use std::collections::BTreeMap;

use sqlx::{PgConnection, PgPool};

use hegemon_core::Snapshot;
use hegemon_types::{Building, Caravan, Region, RegionLocation, Relation, Upgrade};
use hegemon_world::WorldState;

use crate::commit_store::run_count;
use crate::error::DbError;
use crate::rows::{
    BuildingRow, CaravanRow, RegionLocationRow, RegionRow, RelationRow, UpgradeRow, VillageRow,
};

/// Read access to the world tables.
pub struct SnapshotStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new snapshot store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the full world and the version it was read at.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a query fails, [`DbError::Decode`]
    /// or [`DbError::Payload`] if a row cannot be converted, or
    /// [`DbError::Integrity`] if the rows do not form a valid world.
    pub async fn load(&self) -> Result<Snapshot, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let version = run_count(&mut *tx).await?;
        let world = load_world(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(version, "Snapshot read");
        Ok(Snapshot { world, version })
    }
}

async fn load_world(conn: &mut PgConnection) -> Result<WorldState, DbError> {
    let mut upgrades = upgrades_by_village(&mut *conn).await?;
    let mut buildings = buildings_by_village(&mut *conn).await?;

    let village_rows = sqlx::query_as::<_, VillageRow>(
        r"SELECT village_id, name, resources, resource_capacity, research_score,
                 construction_score, research_speed, construction_speed,
                 policy_production, policy_base_stability
          FROM villages
          ORDER BY village_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut villages = Vec::with_capacity(village_rows.len());
    for row in village_rows {
        let id = row.village_id;
        villages.push(row.into_village(
            upgrades.remove(&id).unwrap_or_default(),
            buildings.remove(&id).unwrap_or_default(),
        )?);
    }
    if let Some((&orphan, _)) = upgrades.iter().next() {
        return Err(DbError::MissingRow {
            table: "villages",
            id: orphan,
        });
    }
    if let Some((&orphan, _)) = buildings.iter().next() {
        return Err(DbError::MissingRow {
            table: "villages",
            id: orphan,
        });
    }

    let regions: Vec<Region> = sqlx::query_as::<_, RegionRow>(
        r"SELECT region_id, name, village_id, native_village_id
          FROM regions
          ORDER BY region_id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Region::from)
    .collect();

    let locations = sqlx::query_as::<_, RegionLocationRow>(
        r"SELECT region_location_id, region_id, name, type, occupying_village_id,
                 resource_id, resource_count, stability, defense, health
          FROM region_locations
          ORDER BY region_location_id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(RegionLocation::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    let relations = sqlx::query_as::<_, RelationRow>(
        r"SELECT relation_id, village1_id, village2_id, relation_type,
                 relation_start, relation_end
          FROM village_relations
          ORDER BY relation_id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Relation::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    let caravans = sqlx::query_as::<_, CaravanRow>(
        r"SELECT id, start_time, travel_time, region_id, village_id,
                 caravan_type, resources, name
          FROM caravans
          ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Caravan::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        villages = villages.len(),
        regions = regions.len(),
        locations = locations.len(),
        relations = relations.len(),
        caravans = caravans.len(),
        "Loaded world snapshot"
    );

    Ok(WorldState::from_parts(
        villages, regions, locations, relations, caravans,
    )?)
}

async fn upgrades_by_village(
    conn: &mut PgConnection,
) -> Result<BTreeMap<i64, Vec<Upgrade>>, DbError> {
    let rows = sqlx::query_as::<_, UpgradeRow>(
        r"SELECT id, village_id, key, status, research_progress,
                 research_progress_required, research_progress_last_updated,
                 research_boosted
          FROM village_upgrades
          ORDER BY village_id, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: BTreeMap<i64, Vec<Upgrade>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.village_id)
            .or_default()
            .push(Upgrade::try_from(row)?);
    }
    Ok(grouped)
}

async fn buildings_by_village(
    conn: &mut PgConnection,
) -> Result<BTreeMap<i64, Vec<Building>>, DbError> {
    let rows = sqlx::query_as::<_, BuildingRow>(
        r"SELECT id, village_id, key, tier, status, construction_progress,
                 construction_progress_required, construction_progress_last_updated,
                 construction_boosted, health
          FROM village_buildings
          ORDER BY village_id, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: BTreeMap<i64, Vec<Building>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.village_id)
            .or_default()
            .push(Building::try_from(row)?);
    }
    Ok(grouped)
}
