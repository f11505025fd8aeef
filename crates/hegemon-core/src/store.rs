//! Storage collaborator trait and an in-memory implementation.
//!
//! The engine reads the whole world once per run and writes one batch at
//! the end. [`WorldStore`] captures that contract: a snapshot read, a
//! last-applied-period query for the run guard, and an all-or-nothing
//! commit that records the run alongside the batch.
//!
//! Batches carry absolute values computed from the snapshot, so a commit
//! is only valid against the world it was computed from. Every snapshot
//! carries the store's version, the number of runs committed when it was
//! read, and a commit names the version it was computed against. A store
//! refuses the commit with [`StoreError::Stale`] when any run of either
//! pipeline committed in between.
//!
//! [`MemoryStore`] implements the contract over a [`WorldState`] held in
//! memory. It backs the pipeline tests and applies batches with the same
//! semantics a relational store would.

use std::future::Future;

use tokio::sync::Mutex;
use tracing::debug;

use hegemon_types::{Caravan, Pipeline, ResourceLogEntry};
use hegemon_world::{WorldError, WorldState};

use crate::guard::TickRun;
use crate::mutation::{Mutation, MutationBatch};

/// Errors reported by a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached. Fatal before any mutation.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store is unreachable.
        reason: String,
    },

    /// A read or write failed.
    #[error("store query failed: {message}")]
    Query {
        /// Description of the failure.
        message: String,
    },

    /// A run for this pipeline period was already committed.
    #[error("{pipeline} run for period {period} already applied")]
    AlreadyApplied {
        /// The pipeline.
        pipeline: Pipeline,
        /// The period.
        period: i64,
    },

    /// Another run committed after this run's snapshot was read.
    #[error("snapshot is stale: read at version {read}, store is at version {current}")]
    Stale {
        /// The version the snapshot was read at.
        read: i64,
        /// The version the store holds now.
        current: i64,
    },

    /// Loaded or committed rows break a reference invariant.
    #[error("world integrity error: {source}")]
    Integrity {
        /// The underlying integrity error.
        #[from]
        source: WorldError,
    },
}

/// A world read together with the store version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The validated world.
    pub world: WorldState,
    /// Number of runs committed when the world was read.
    pub version: i64,
}

/// The storage collaborator a pipeline runs against.
pub trait WorldStore {
    /// Read every entity a run needs, as one consistent view.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be reached,
    /// or [`StoreError::Integrity`] if the rows do not form a valid world.
    fn load_snapshot(&self) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// The highest period committed for a pipeline, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the run table cannot be read.
    fn last_applied_period(
        &self,
        pipeline: Pipeline,
    ) -> impl Future<Output = Result<Option<i64>, StoreError>> + Send;

    /// Apply a batch computed from the snapshot at `version` and record
    /// the run, atomically.
    ///
    /// Either every mutation and the run record are applied, or none are.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyApplied`] if a run for the same
    /// pipeline period exists, [`StoreError::Stale`] if any run committed
    /// since `version`, or any failure that rolled the batch back.
    fn commit(
        &self,
        batch: &MutationBatch,
        run: &TickRun,
        version: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MemoryState {
    world: WorldState,
    runs: Vec<TickRun>,
    resource_log: Vec<ResourceLogEntry>,
    available: bool,
}

/// A [`WorldStore`] over an in-memory world.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create a store holding `world`.
    pub fn new(world: WorldState) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                world,
                runs: Vec::new(),
                resource_log: Vec::new(),
                available: true,
            }),
        }
    }

    /// A copy of the stored world.
    pub async fn world(&self) -> WorldState {
        self.state.lock().await.world.clone()
    }

    /// Every committed run, in commit order.
    pub async fn runs(&self) -> Vec<TickRun> {
        self.state.lock().await.runs.clone()
    }

    /// Every committed resource log entry, in commit order.
    pub async fn resource_log(&self) -> Vec<ResourceLogEntry> {
        self.state.lock().await.resource_log.clone()
    }

    /// Simulate the store going down or coming back.
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }
}

impl MemoryState {
    fn version(&self) -> i64 {
        i64::try_from(self.runs.len()).unwrap_or(i64::MAX)
    }
}

fn missing(what: &str, id: impl core::fmt::Display) -> StoreError {
    StoreError::Query {
        message: format!("{what} {id} does not exist"),
    }
}

/// Apply one mutation to a world, collecting log entries separately.
fn apply(
    world: &mut WorldState,
    log: &mut Vec<ResourceLogEntry>,
    mutation: &Mutation,
) -> Result<(), StoreError> {
    match mutation {
        Mutation::VillageResources {
            village_id,
            resources,
        } => {
            world.village_mut(*village_id)?.resources = resources.clone();
        }
        Mutation::VillageScores {
            village_id,
            research_score,
            construction_score,
        } => {
            let village = world.village_mut(*village_id)?;
            village.research_score = *research_score;
            village.construction_score = *construction_score;
        }
        Mutation::Upgrade(upgrade) => {
            let slot = world
                .village_mut(upgrade.village_id)?
                .upgrades
                .iter_mut()
                .find(|u| u.id == upgrade.id)
                .ok_or_else(|| missing("upgrade", upgrade.id))?;
            *slot = upgrade.clone();
        }
        Mutation::Building(building) => {
            let slot = world
                .village_mut(building.village_id)?
                .buildings
                .iter_mut()
                .find(|b| b.id == building.id)
                .ok_or_else(|| missing("building", building.id))?;
            *slot = building.clone();
        }
        Mutation::RegionLocation {
            location_id,
            resource_count,
            stability,
            defense,
            health,
        } => {
            let location = world.location_mut(*location_id)?;
            location.resource_count = *resource_count;
            location.stability = *stability;
            location.defense = *defense;
            location.health = *health;
        }
        Mutation::LocationResourceCount {
            location_id,
            resource_count,
        } => {
            world.location_mut(*location_id)?.resource_count = *resource_count;
        }
        Mutation::ResourceLog(entry) => log.push(entry.clone()),
        Mutation::InsertCaravan(caravan) => {
            let id = world.next_caravan_id();
            world.insert_caravan(Caravan {
                id,
                start_time: caravan.start_time,
                travel_time_ms: caravan.travel_time_ms,
                region_id: caravan.region_id,
                village_id: caravan.village_id,
                kind: caravan.kind,
                resources: caravan.resources.to_payload(),
                name: caravan.name.clone(),
            })?;
        }
        Mutation::DeleteCaravan(id) => {
            world.remove_caravan(*id);
        }
        Mutation::EndRelation {
            relation_id,
            ended_at,
        } => {
            world.relation_mut(*relation_id)?.relation_end = Some(*ended_at);
        }
        Mutation::TransferLocation {
            location_id,
            occupying_village_id,
        } => {
            world.village(*occupying_village_id)?;
            world.location_mut(*location_id)?.occupying_village_id = Some(*occupying_village_id);
        }
    }
    Ok(())
}

impl WorldStore for MemoryStore {
    async fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        let state = self.state.lock().await;
        if !state.available {
            return Err(StoreError::Unavailable {
                reason: "memory store switched off".to_owned(),
            });
        }
        state.world.validate()?;
        Ok(Snapshot {
            world: state.world.clone(),
            version: state.version(),
        })
    }

    async fn last_applied_period(&self, pipeline: Pipeline) -> Result<Option<i64>, StoreError> {
        let state = self.state.lock().await;
        if !state.available {
            return Err(StoreError::Unavailable {
                reason: "memory store switched off".to_owned(),
            });
        }
        Ok(state
            .runs
            .iter()
            .filter(|r| r.pipeline == pipeline)
            .map(|r| r.period)
            .max())
    }

    async fn commit(
        &self,
        batch: &MutationBatch,
        run: &TickRun,
        version: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.available {
            return Err(StoreError::Unavailable {
                reason: "memory store switched off".to_owned(),
            });
        }
        if state
            .runs
            .iter()
            .any(|r| r.pipeline == run.pipeline && r.period == run.period)
        {
            return Err(StoreError::AlreadyApplied {
                pipeline: run.pipeline,
                period: run.period,
            });
        }
        let current = state.version();
        if current != version {
            return Err(StoreError::Stale {
                read: version,
                current,
            });
        }

        // Work on copies so a failure leaves the store untouched.
        let mut world = state.world.clone();
        let mut log = Vec::new();
        for mutation in batch.iter() {
            apply(&mut world, &mut log, mutation)?;
        }
        world.validate()?;

        state.world = world;
        state.resource_log.extend(log);
        let mut recorded = run.clone();
        recorded.mutation_count = u64::try_from(batch.len()).unwrap_or(u64::MAX);
        state.runs.push(recorded);

        debug!(
            pipeline = %run.pipeline,
            period = run.period,
            mutations = batch.len(),
            "Memory store committed batch"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use hegemon_types::{
        LocationType, RegionLocationId, ResourceBundle, ResourceKind, VillageId,
    };

    use super::*;
    use crate::testing::{location, region, village};

    fn world() -> WorldState {
        WorldState::from_parts(
            vec![village(1), village(2)],
            vec![region(7, 1, 1)],
            vec![location(1, 7, LocationType::Village, 1, ResourceKind::Food, 0)],
            Vec::new(),
            Vec::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn commit_applies_batch_and_records_run() {
        let store = MemoryStore::new(world());
        let mut batch = MutationBatch::new();
        batch.push(Mutation::VillageResources {
            village_id: VillageId(1),
            resources: ResourceBundle::from_pairs([(ResourceKind::Food, 9)]),
        });
        let run = TickRun::begin(Pipeline::Hourly, Utc::now(), 3600);

        store.commit(&batch, &run, 0).await.unwrap();

        let stored = store.world().await;
        assert_eq!(
            stored.village(VillageId(1)).unwrap().resources.get(ResourceKind::Food),
            9
        );
        let runs = store.runs().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs.first().map(|r| r.mutation_count), Some(1));
        assert_eq!(
            store.last_applied_period(Pipeline::Hourly).await.unwrap(),
            Some(run.period)
        );
        assert_eq!(store.last_applied_period(Pipeline::Caravan).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_period_is_refused() {
        let store = MemoryStore::new(world());
        let run = TickRun::begin(Pipeline::Caravan, Utc::now(), 21_600);
        store.commit(&MutationBatch::new(), &run, 0).await.unwrap();
        let again = store.commit(&MutationBatch::new(), &run, 1).await;
        assert!(matches!(again, Err(StoreError::AlreadyApplied { .. })));
    }

    #[tokio::test]
    async fn failed_batch_changes_nothing() {
        let store = MemoryStore::new(world());
        let mut batch = MutationBatch::new();
        batch.push(Mutation::VillageResources {
            village_id: VillageId(1),
            resources: ResourceBundle::from_pairs([(ResourceKind::Food, 9)]),
        });
        batch.push(Mutation::TransferLocation {
            location_id: RegionLocationId(1),
            occupying_village_id: VillageId(99),
        });
        let run = TickRun::begin(Pipeline::Hourly, Utc::now(), 3600);

        assert!(store.commit(&batch, &run, 0).await.is_err());
        assert_eq!(store.world().await, world());
        assert!(store.runs().await.is_empty());
    }

    #[tokio::test]
    async fn commit_against_an_outdated_snapshot_is_refused() {
        let store = MemoryStore::new(world());
        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.version, 0);

        let hourly = TickRun::begin(Pipeline::Hourly, Utc::now(), 3600);
        store.commit(&MutationBatch::new(), &hourly, 0).await.unwrap();

        let mut batch = MutationBatch::new();
        batch.push(Mutation::VillageResources {
            village_id: VillageId(1),
            resources: ResourceBundle::from_pairs([(ResourceKind::Food, 9)]),
        });
        let caravan = TickRun::begin(Pipeline::Caravan, Utc::now(), 21_600);
        let result = store.commit(&batch, &caravan, snapshot.version).await;

        assert!(matches!(
            result,
            Err(StoreError::Stale {
                read: 0,
                current: 1
            })
        ));
        assert_eq!(store.world().await, world());
        assert_eq!(store.runs().await.len(), 1);
        assert_eq!(store.load_snapshot().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn resource_count_write_leaves_stability_alone() {
        let store = MemoryStore::new(world());
        let mut batch = MutationBatch::new();
        batch.push(Mutation::RegionLocation {
            location_id: RegionLocationId(1),
            resource_count: 12,
            stability: 30,
            defense: 20,
            health: 100,
        });
        batch.push(Mutation::LocationResourceCount {
            location_id: RegionLocationId(1),
            resource_count: 0,
        });
        let run = TickRun::begin(Pipeline::Caravan, Utc::now(), 21_600);

        store.commit(&batch, &run, 0).await.unwrap();

        let stored = store.world().await;
        let after = stored.location(RegionLocationId(1)).unwrap();
        assert_eq!(after.resource_count, 0);
        assert_eq!(after.stability, 30);
        assert_eq!(after.defense, 20);
    }

    #[tokio::test]
    async fn unavailable_store_fails_reads() {
        let store = MemoryStore::new(world());
        store.set_available(false).await;
        assert!(matches!(
            store.load_snapshot().await,
            Err(StoreError::Unavailable { .. })
        ));
    }
}
