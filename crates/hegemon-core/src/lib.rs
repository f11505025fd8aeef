//! Tick pipelines, caravan cycle, and orchestration for the Hegemon world
//! simulation.
//!
//! This crate owns the two periodic pipelines that drive the world:
//!
//! - the **hourly tick**: progress, upkeep, decay, wars, base production,
//!   and territorial convergence, in that order;
//! - the **caravan cycle**: settle every caravan in flight, then dispatch
//!   new ones from the regions' accrued resources.
//!
//! Both run against a [`WorldStore`] and end in one [`MutationBatch`] that
//! is either committed atomically with a run record, or returned for a
//! dry-run trace.
//!
//! # Modules
//!
//! - [`caravan`] -- Caravan settlement and generation.
//! - [`catalog`] -- Upgrade and building tables.
//! - [`config`] -- Configuration loading from `hegemon-config.yaml`.
//! - [`guard`] -- Period indexing and the run record.
//! - [`hourly`] -- The hourly phase sequence.
//! - [`mutation`] -- Typed writes and the ordered batch.
//! - [`progress`] -- Research and construction progress.
//! - [`scores`] -- [`ScoreCalculator`] trait and [`CatalogScores`].
//! - [`store`] -- [`WorldStore`] trait and [`MemoryStore`].
//! - [`tick`] -- [`TickEngine`], errors, and reports.
//! - [`war`] -- [`VictoryEvaluator`] trait and [`NoVictory`].
//!
//! [`WorldStore`]: store::WorldStore
//! [`MemoryStore`]: store::MemoryStore
//! [`MutationBatch`]: mutation::MutationBatch
//! [`ScoreCalculator`]: scores::ScoreCalculator
//! [`CatalogScores`]: scores::CatalogScores
//! [`TickEngine`]: tick::TickEngine
//! [`VictoryEvaluator`]: war::VictoryEvaluator
//! [`NoVictory`]: war::NoVictory

pub mod caravan;
pub mod catalog;
pub mod config;
pub mod guard;
pub mod hourly;
pub mod mutation;
pub mod progress;
pub mod scores;
pub mod store;
pub mod tick;
pub mod war;

#[cfg(test)]
mod testing;

pub use config::HegemonConfig;
pub use guard::TickRun;
pub use mutation::{DRY_RUN_BEGIN, DRY_RUN_END, Mutation, MutationBatch, RUN_COMPLETE};
pub use store::{MemoryStore, Snapshot, StoreError, WorldStore};
pub use tick::{TickEngine, TickError, TickIssue, TickReport};
pub use war::{NoVictory, VictoryEvaluator};
