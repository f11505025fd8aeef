//! World state and territorial convergence for the Hegemon tick engine.
//!
//! This crate holds the in-memory working set a tick runs over and the
//! pure math that moves territory toward equilibrium each hour.
//!
//! # Modules
//!
//! - [`state`] -- [`WorldState`], an arena of every loaded entity keyed by
//!   id, with integrity validation.
//! - [`convergence`] -- Stability baselines, the shared shift formula,
//!   defense bounds, location production, and the per-region pass.
//! - [`error`] -- Data-integrity errors.

pub mod convergence;
pub mod error;
pub mod state;

pub use convergence::{
    LocationYield, MAX_DEFENSE, MIN_DEFENSE, ShiftRule, TerritoryRules, TownContext,
    castle_baseline, converge_defense, converge_region, location_production, shift_toward,
    town_baseline,
};
pub use error::WorldError;
pub use state::WorldState;
