//! Error types for the tick engine binary.
//!
//! [`EngineError`] wraps every failure a run can end with. `main` adds
//! context through `anyhow` on top of it.

/// Top-level error for the tick engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hegemon_core::config::ConfigError,
    },

    /// The database could not be reached or migrated.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: hegemon_db::DbError,
    },

    /// The run itself failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: hegemon_core::TickError,
    },
}
