//! Batch writer for processed CrowdTangle results.
//!
//! [`RecordWriter::process`] persists one batch of [`EncapsulatedPost`]s in a
//! single transaction, writing tables in foreign-key order:
//!
//! ```text
//! 1. accounts            (deduplicated, latest `updated` wins)
//! 2. posts
//! 3. post statistics     (actual + expected)
//! 4. expanded links
//! 5. media
//! 6. post dashboards     (post id -> dashboard id, last write wins)
//! ```
//!
//! Concurrent writers touching overlapping accounts can deadlock each other.
//! `PostgreSQL` resolves that by aborting one side with SQLSTATE `40P01`; the
//! aborted batch is rolled back and replayed from scratch under a
//! [`RetryPolicy`]. Any other error is returned on first occurrence.

use std::collections::BTreeMap;

use crowdtangle_types::{
    DashboardId, EncapsulatedPost, ExpandedLink, Media, Post, PostId, PostStatistics,
};

use crate::dedupe::latest_accounts;
use crate::error::DbError;
use crate::retry::RetryPolicy;
use crate::store::{RecordSession, RecordStore};

/// Writes batches of post records through a [`RecordStore`].
pub struct RecordWriter<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: RecordStore> RecordWriter<S> {
    /// Create a writer with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    /// Create a writer with an explicit retry policy.
    pub const fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// The retry policy in effect.
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Persist a batch, retrying the whole batch on deadlock.
    ///
    /// # Errors
    ///
    /// Returns the first non-deadlock [`DbError`] unchanged, or the last
    /// deadlock error once the retry policy is exhausted.
    pub async fn process(&self, batch: &[EncapsulatedPost]) -> Result<(), DbError> {
        let mut attempt: u32 = 1;
        loop {
            match self.write_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_deadlock() && self.retry.allows_retry_after(attempt) => {
                    let delay = self.retry.backoff(attempt, &mut rand::rng());
                    tracing::info!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        records = batch.len(),
                        error = %e,
                        "Deadlock writing batch, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt: begin, write everything, then commit or roll back.
    ///
    /// The session is consumed on both paths, so the connection is back in
    /// the pool before the caller decides whether to retry.
    async fn write_batch(&self, batch: &[EncapsulatedPost]) -> Result<(), DbError> {
        let mut session = self.store.begin().await?;

        match write_records(&mut session, batch).await {
            Ok(()) => session.commit().await,
            Err(e) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed after write error");
                }
                Err(e)
            }
        }
    }
}

/// Issue the six writes of a batch in foreign-key order.
async fn write_records<T: RecordSession>(
    session: &mut T,
    batch: &[EncapsulatedPost],
) -> Result<(), DbError> {
    session.upsert_accounts(&latest_accounts(batch)).await?;

    let posts: Vec<&Post> = batch.iter().map(|record| &record.post).collect();
    session.upsert_posts(&posts).await?;

    let actual: Vec<&PostStatistics> = batch.iter().map(|r| &r.statistics_actual).collect();
    let expected: Vec<&PostStatistics> = batch.iter().map(|r| &r.statistics_expected).collect();
    session.upsert_statistics(&actual, &expected).await?;

    let links: Vec<&ExpandedLink> = batch.iter().flat_map(|r| &r.expanded_links).collect();
    session.upsert_expanded_links(&links).await?;

    let media: Vec<&Media> = batch.iter().flat_map(|r| &r.media_list).collect();
    session.upsert_media(&media).await?;

    session.insert_post_dashboards(&post_dashboards(batch)).await?;

    tracing::debug!(records = batch.len(), "Wrote batch");
    Ok(())
}

/// Map each post id to the dashboard it came through; later records win.
pub fn post_dashboards(batch: &[EncapsulatedPost]) -> BTreeMap<PostId, DashboardId> {
    batch
        .iter()
        .map(|record| (record.post.id.clone(), record.dashboard_id))
        .collect()
}
