//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.
//! [`DbError`] converts into the engine's [`StoreError`], keeping
//! connection failures distinct from query failures.

use hegemon_core::StoreError;
use hegemon_types::{PayloadError, Pipeline};
use hegemon_world::WorldError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value does not map onto the domain types.
    #[error("invalid {column} in {table}: {value}")]
    Decode {
        /// Source table.
        table: &'static str,
        /// Offending column.
        column: &'static str,
        /// The raw value.
        value: String,
    },

    /// A stored resource map is not valid JSON.
    #[error("invalid resource map: {0}")]
    Payload(#[from] PayloadError),

    /// The loaded rows do not form a valid world.
    #[error("world integrity error: {0}")]
    Integrity(#[from] WorldError),

    /// A run for this pipeline period already exists.
    #[error("{pipeline} run for period {period} already applied")]
    AlreadyApplied {
        /// The pipeline.
        pipeline: Pipeline,
        /// The period.
        period: i64,
    },

    /// Another run committed after the batch's snapshot was read.
    #[error("snapshot read at version {read}, tick_runs now holds {current} runs")]
    Stale {
        /// The version the snapshot was read at.
        read: i64,
        /// The run count at commit time.
        current: i64,
    },

    /// A mutation targets a row that does not exist.
    #[error("{table} row {id} does not exist")]
    MissingRow {
        /// Target table.
        table: &'static str,
        /// Row key.
        id: i64,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the error means the database could not be reached.
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Postgres(
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ) | Self::Config(_)
        )
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            return Self::Unavailable {
                reason: err.to_string(),
            };
        }
        match err {
            DbError::Integrity(source) => Self::Integrity { source },
            DbError::AlreadyApplied { pipeline, period } => {
                Self::AlreadyApplied { pipeline, period }
            }
            DbError::Stale { read, current } => Self::Stale { read, current },
            other => Self::Query {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_map_to_unavailable() {
        let store: StoreError = DbError::Postgres(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(store, StoreError::Unavailable { .. }));
    }

    #[test]
    fn query_failures_stay_query_failures() {
        let store: StoreError = DbError::MissingRow {
            table: "villages",
            id: 4,
        }
        .into();
        assert!(matches!(store, StoreError::Query { .. }));
    }

    #[test]
    fn duplicate_runs_keep_their_pipeline() {
        let store: StoreError = DbError::AlreadyApplied {
            pipeline: Pipeline::Caravan,
            period: 12,
        }
        .into();
        assert!(matches!(
            store,
            StoreError::AlreadyApplied {
                pipeline: Pipeline::Caravan,
                period: 12
            }
        ));
    }

    #[test]
    fn stale_commits_keep_both_versions() {
        let store: StoreError = DbError::Stale {
            read: 3,
            current: 4,
        }
        .into();
        assert!(matches!(
            store,
            StoreError::Stale {
                read: 3,
                current: 4
            }
        ));
    }
}
