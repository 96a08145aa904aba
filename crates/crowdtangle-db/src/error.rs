//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors. The writer only needs one extra piece of knowledge about
//! an error: whether it is a deadlock, in which case the whole batch is
//! retried. See [`DbError::is_deadlock`].

use sqlx::Error as SqlxError;

/// SQLSTATE `PostgreSQL` reports when it breaks a deadlock by aborting one
/// of the participating transactions.
pub const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this error is a deadlock-class conflict that is safe to retry
    /// by replaying the whole transaction.
    pub fn is_deadlock(&self) -> bool {
        match self {
            Self::Postgres(e) => is_deadlock_error(e),
            Self::Migration(_) | Self::Config(_) => false,
        }
    }
}

/// Determines if a [`sqlx::Error`] is a deadlock reported by the database.
///
/// SQLSTATE is authoritative. The message is only consulted when the driver
/// surfaced no code at all.
pub fn is_deadlock_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db_error) => db_error.code().map_or_else(
            || {
                db_error
                    .message()
                    .to_lowercase()
                    .contains("deadlock detected")
            },
            |code| code.as_ref() == DEADLOCK_DETECTED,
        ),
        _ => false,
    }
}
