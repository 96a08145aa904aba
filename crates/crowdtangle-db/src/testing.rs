//! Test doubles shared by the unit tests in this crate.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use sqlx::error::{DatabaseError, ErrorKind};

use crate::error::{DEADLOCK_DETECTED, DbError};

/// A database error carrying an arbitrary message and SQLSTATE.
#[derive(Debug)]
struct MockDbError {
    msg: &'static str,
    code: Option<&'static str>,
}

impl fmt::Display for MockDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.msg)
    }
}

impl StdError for MockDbError {}

impl DatabaseError for MockDbError {
    fn message(&self) -> &str {
        self.msg
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        self.code.map(Cow::from)
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }
}

/// Build a [`DbError::Postgres`] wrapping a database-reported error.
pub fn db_err(msg: &'static str, code: Option<&'static str>) -> DbError {
    DbError::Postgres(sqlx::Error::from(MockDbError { msg, code }))
}

/// A deadlock as `PostgreSQL` reports it.
pub fn deadlock() -> DbError {
    db_err("deadlock detected", Some(DEADLOCK_DETECTED))
}

/// A unique violation, which must never be retried.
pub fn unique_violation() -> DbError {
    db_err(
        "duplicate key value violates unique constraint \"posts_pkey\"",
        Some("23505"),
    )
}
