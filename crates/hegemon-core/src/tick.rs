//! Run orchestration: guard, load, compute, and commit or trace.
//!
//! Both pipelines share one shape:
//!
//! 1. **Guard** -- compute the period for `now` and refuse the run if the
//!    store already recorded that period (skipped for dry runs).
//! 2. **Load** -- read and validate a snapshot into a [`WorldState`],
//!    noting the store version it was read at.
//! 3. **Compute** -- run the pipeline's phases over the working set,
//!    producing a [`MutationBatch`] and a list of skipped entities.
//! 4. **Commit** -- hand the batch and the run record to the store as one
//!    unit, or return it untouched for a dry-run trace. The store refuses
//!    the commit if any run of either pipeline committed after the load;
//!    the batch is then discarded and the run can be retried.
//!
//! The phases themselves live in [`crate::hourly`] and [`crate::caravan`].

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use hegemon_types::{CaravanId, Pipeline, RelationId};
use hegemon_world::{WorldError, WorldState};

use crate::caravan::caravan_cycle;
use crate::catalog::CatalogError;
use crate::config::{ConfigError, HegemonConfig};
use crate::guard::TickRun;
use crate::hourly::hourly_tick;
use crate::mutation::MutationBatch;
use crate::scores::ScoreError;
use crate::store::{Snapshot, StoreError, WorldStore};
use crate::war::VictoryEvaluator;

/// Errors that abort a run before anything is committed.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The configuration is invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The working set broke a reference invariant.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// Economy arithmetic failed.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: hegemon_ledger::LedgerError,
    },

    /// The storage collaborator failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// A catalog lookup failed.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },

    /// Rescoring a village failed.
    #[error("score error: {source}")]
    Score {
        /// The underlying score error.
        #[from]
        source: ScoreError,
    },

    /// This pipeline period was already committed.
    #[error("{pipeline} run for period {period} was already applied")]
    AlreadyApplied {
        /// The pipeline.
        pipeline: Pipeline,
        /// The period.
        period: i64,
    },
}

/// A single entity the run skipped without aborting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickIssue {
    /// An in-progress entity has no progress requirement.
    #[error("{entity} {id} is in progress without a requirement")]
    MissingRequirement {
        /// Entity kind.
        entity: &'static str,
        /// Row id.
        id: i64,
    },

    /// Advancing progress overflowed.
    #[error("{entity} {id} progress overflowed")]
    ProgressOverflow {
        /// Entity kind.
        entity: &'static str,
        /// Row id.
        id: i64,
    },

    /// The victory evaluator failed for one war.
    #[error("war {relation} was not evaluated: {reason}")]
    WarEvaluation {
        /// The war.
        relation: RelationId,
        /// Why evaluation failed.
        reason: String,
    },

    /// A caravan payload could not be decoded.
    #[error("caravan {caravan} has an unreadable payload: {reason}")]
    MalformedCaravan {
        /// The caravan.
        caravan: CaravanId,
        /// Decode failure.
        reason: String,
    },
}

/// What a pipeline's compute step produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Ordered writes.
    pub batch: MutationBatch,
    /// Entities skipped along the way.
    pub issues: Vec<TickIssue>,
}

/// The result of one run.
#[derive(Debug)]
pub struct TickReport {
    /// The run record, committed unless this was a dry run.
    pub run: TickRun,
    /// Every write the run computed.
    pub batch: MutationBatch,
    /// Entities skipped along the way.
    pub issues: Vec<TickIssue>,
    /// The working set after the run's phases.
    pub world: WorldState,
    /// Whether the batch was only traced.
    pub dry_run: bool,
}

/// Drives both pipelines against a storage collaborator.
#[derive(Debug)]
pub struct TickEngine<'a, S> {
    config: &'a HegemonConfig,
    store: &'a S,
}

impl<'a, S: WorldStore> TickEngine<'a, S> {
    /// Create an engine over a config and store.
    pub const fn new(config: &'a HegemonConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    /// Run the hourly stability and production tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::AlreadyApplied`] if this hour was committed,
    /// or any error that aborted the run. Nothing is written on error.
    pub async fn run_hourly(
        &self,
        victory: &impl VictoryEvaluator,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<TickReport, TickError> {
        let config = self.config;
        self.execute(
            Pipeline::Hourly,
            config.world.tick_period_secs,
            now,
            dry_run,
            |world| hourly_tick(world, config, victory, now),
        )
        .await
    }

    /// Run the caravan settlement and generation cycle.
    ///
    /// Departure jitter is seeded from `world.seed` when configured.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::AlreadyApplied`] if this period was committed,
    /// or any error that aborted the run. Nothing is written on error.
    pub async fn run_caravan(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<TickReport, TickError> {
        let config = self.config;
        let mut rng = config
            .world
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        self.execute(
            Pipeline::Caravan,
            config.world.caravan_period_secs,
            now,
            dry_run,
            |world| caravan_cycle(world, config, &mut rng, now),
        )
        .await
    }

    async fn execute<F>(
        &self,
        pipeline: Pipeline,
        period_secs: u64,
        now: DateTime<Utc>,
        dry_run: bool,
        compute: F,
    ) -> Result<TickReport, TickError>
    where
        F: FnOnce(&mut WorldState) -> Result<TickOutcome, TickError>,
    {
        let mut run = TickRun::begin(pipeline, now, period_secs);

        if !dry_run {
            let last = self.store.last_applied_period(pipeline).await?;
            if run.is_blocked_by(last) {
                warn!(%pipeline, period = run.period, ?last, "Period already applied, refusing run");
                return Err(TickError::AlreadyApplied {
                    pipeline,
                    period: run.period,
                });
            }
        }

        let Snapshot { mut world, version } = self.store.load_snapshot().await?;
        info!(
            %pipeline,
            period = run.period,
            version,
            villages = world.village_count(),
            caravans = world.caravan_count(),
            "Snapshot loaded"
        );

        let outcome = compute(&mut world)?;
        run.mutation_count = u64::try_from(outcome.batch.len()).unwrap_or(u64::MAX);
        for issue in &outcome.issues {
            warn!(%pipeline, %issue, "Entity skipped");
        }

        if dry_run {
            info!(
                %pipeline,
                period = run.period,
                mutations = outcome.batch.len(),
                "Dry run complete, nothing applied"
            );
        } else {
            self.store
                .commit(&outcome.batch, &run, version)
                .await
                .map_err(|e| match e {
                    StoreError::AlreadyApplied { pipeline, period } => {
                        TickError::AlreadyApplied { pipeline, period }
                    }
                    other => TickError::from(other),
                })?;
            info!(
                %pipeline,
                period = run.period,
                run_id = %run.id,
                mutations = outcome.batch.len(),
                issues = outcome.issues.len(),
                "Run committed"
            );
        }

        Ok(TickReport {
            run,
            batch: outcome.batch,
            issues: outcome.issues,
            world,
            dry_run,
        })
    }
}
