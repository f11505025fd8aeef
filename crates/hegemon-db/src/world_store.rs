//! The `PostgreSQL` implementation of the engine's storage seam.

use hegemon_core::{MutationBatch, Snapshot, StoreError, TickRun, WorldStore};
use hegemon_types::Pipeline;

use crate::commit_store::CommitStore;
use crate::postgres::PostgresPool;
use crate::snapshot_store::SnapshotStore;

/// A [`WorldStore`] backed by a `PostgreSQL` pool.
///
/// Every [`crate::DbError`] is translated into a [`StoreError`] on the way
/// out, so the engine sees connection failures as
/// [`StoreError::Unavailable`], duplicate runs as
/// [`StoreError::AlreadyApplied`], and commits from an outdated snapshot as
/// [`StoreError::Stale`].
#[derive(Debug, Clone)]
pub struct PgWorldStore {
    pool: PostgresPool,
}

impl PgWorldStore {
    /// Wrap a connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }
}

impl WorldStore for PgWorldStore {
    async fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        SnapshotStore::new(self.pool.pool())
            .load()
            .await
            .map_err(StoreError::from)
    }

    async fn last_applied_period(&self, pipeline: Pipeline) -> Result<Option<i64>, StoreError> {
        CommitStore::new(self.pool.pool())
            .last_applied_period(pipeline)
            .await
            .map_err(StoreError::from)
    }

    async fn commit(
        &self,
        batch: &MutationBatch,
        run: &TickRun,
        version: i64,
    ) -> Result<(), StoreError> {
        CommitStore::new(self.pool.pool())
            .apply(batch, run, version)
            .await
            .map_err(StoreError::from)
    }
}
