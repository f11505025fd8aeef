//! Type-safe identifier wrappers.
//!
//! Every persisted entity is keyed by the integer primary key of its table.
//! Wrapping those keys in distinct newtypes prevents a region id from being
//! passed where a village id is expected. Tick runs are the exception: they
//! are created by the engine rather than the store and use UUID v7.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around an `i64` row key with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the inner row key.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a village (player faction).
    VillageId
}

define_id! {
    /// Identifier of a top-level region.
    RegionId
}

define_id! {
    /// Identifier of a site within a region.
    RegionLocationId
}

define_id! {
    /// Identifier of a village upgrade row.
    UpgradeId
}

define_id! {
    /// Identifier of a village building row.
    BuildingId
}

define_id! {
    /// Identifier of a relation between two villages.
    RelationId
}

define_id! {
    /// Identifier of an in-flight caravan.
    CaravanId
}

/// Identifier of one applied (or attempted) engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TickRunId(pub Uuid);

impl TickRunId {
    /// Create a new run identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for TickRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for TickRunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
