//! `PostgreSQL` storage for the Hegemon tick engine.
//!
//! A run reads the world once and writes its batch once:
//!
//! ```text
//! Tick run
//!     |
//!     +-- SnapshotStore::load -----> villages, upgrades, buildings, regions,
//!     |                              locations, relations, caravans
//!     |
//!     +-- CommitStore::apply ------> one locked transaction:
//!                                    tick_runs row + every mutation
//! ```
//!
//! [`PgWorldStore`] implements [`hegemon_core::WorldStore`] over both.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`rows`] -- Row types and their conversion into domain types
//! - [`snapshot_store`] -- World snapshot loading
//! - [`commit_store`] -- Run records and atomic batch application
//! - [`world_store`] -- The engine-facing store
//! - [`error`] -- Shared error types

pub mod commit_store;
pub mod error;
pub mod postgres;
pub mod rows;
pub mod snapshot_store;
pub mod world_store;

pub use commit_store::CommitStore;
pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use snapshot_store::SnapshotStore;
pub use world_store::PgWorldStore;
