//! `PostgreSQL` writer for processed CrowdTangle results.
//!
//! Takes batches of [`EncapsulatedPost`](crowdtangle_types::EncapsulatedPost)
//! records from the upstream processing stage and persists them in
//! foreign-key order inside one transaction per batch, replaying the batch
//! when `PostgreSQL` aborts it to break a deadlock.
//!
//! # Architecture
//!
//! ```text
//! batch of EncapsulatedPost
//!     |
//!     +-- dedupe accounts (latest `updated` wins)
//!     |
//!     +-- RecordWriter::process
//!         |-- RecordStore::begin        (pooled connection + BEGIN)
//!         |-- six upserts, FK order     (RecordSession)
//!         |-- commit / rollback         (connection released)
//!         +-- on 40P01: backoff, replay (RetryPolicy)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`dedupe`] -- Latest-wins account deduplication
//! - [`store`] -- Store/session traits and the `PostgreSQL` upserts
//! - [`retry`] -- Attempt cap and jittered exponential backoff
//! - [`writer`] -- The batch writer tying it together
//! - [`error`] -- Shared error types

pub mod dedupe;
mod env;
pub mod error;
pub mod postgres;
pub mod retry;
pub mod store;
pub mod writer;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use dedupe::{dedupe_accounts_by_latest_update, latest_accounts};
pub use error::DbError;
pub use postgres::{ConnectionParams, ConnectionTarget, PostgresConfig, PostgresPool};
pub use retry::RetryPolicy;
pub use store::{PgRecordStore, PgSession, RecordSession, RecordStore};
pub use writer::{RecordWriter, post_dashboards};
