//! Shared type definitions for the Hegemon world simulation.
//!
//! This crate is the single source of truth for the entities the tick
//! engine reads and writes: villages with their upgrades and buildings,
//! regions and their locations, relations, caravans, and resource log
//! entries.
//!
//! # Modules
//!
//! - [`ids`] -- Integer row-key wrappers for every entity, plus run ids
//! - [`enums`] -- Resource kinds, statuses, location and relation kinds
//! - [`structs`] -- Entity structs and the clamping [`ResourceBundle`]

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BuildingStatus, CaravanKind, LocationType, Pipeline, RelationKind, ResourceKind,
    ResourceLogType, UpgradeEffect, UpgradeStatus,
};
pub use ids::{
    BuildingId, CaravanId, RegionId, RegionLocationId, RelationId, TickRunId, UpgradeId,
    VillageId,
};
pub use structs::{
    Building, Caravan, NewCaravan, PayloadError, Policy, Region, RegionLocation, Relation,
    ResourceBundle, ResourceLogEntry, Upgrade, Village,
};
