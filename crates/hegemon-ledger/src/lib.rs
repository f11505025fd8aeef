//! Resource log and village economy phases for the Hegemon tick engine.
//!
//! Every resource movement a tick performs against a village's stores is
//! recorded here. Balances are clamped at zero; the log records what was
//! requested or produced, never a negative quantity.
//!
//! # Modules
//!
//! - [`ledger`] -- The [`ResourceLog`] append-only log with typed recorders.
//! - [`economy`] -- Upkeep, excess decay, and base production phases.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use hegemon_ledger::ResourceLog;
//! use hegemon_types::{ResourceKind, ResourceLogType, VillageId};
//!
//! let mut log = ResourceLog::new();
//! log.record_production(VillageId(1), ResourceKind::Food, 12, Utc::now());
//! log.record_collection(VillageId(1), ResourceKind::Food, 12, Utc::now());
//!
//! assert_eq!(
//!     log.total(VillageId(1), ResourceKind::Food, ResourceLogType::Collection),
//!     12
//! );
//! ```

pub mod economy;
pub mod ledger;

pub use economy::{
    apply_base_production, apply_decay, apply_upkeep, base_production, credit_bundle,
    decay_amounts, hourly_decay_rate,
};
pub use ledger::ResourceLog;

use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur computing economy phases.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Decay rates must not be negative.
    #[error("decay rate must not be negative, got {rate}")]
    NegativeRate {
        /// The invalid rate.
        rate: Decimal,
    },

    /// Decimal arithmetic exceeded its range.
    #[error("resource arithmetic overflowed")]
    Overflow,
}
