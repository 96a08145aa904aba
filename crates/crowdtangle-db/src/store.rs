//! Upsert operations for the CrowdTangle tables.
//!
//! [`RecordStore`] hands out one [`RecordSession`] per batch attempt. A
//! session owns a pooled connection with an open transaction; it is consumed
//! by [`RecordSession::commit`] or [`RecordSession::rollback`], and the
//! connection goes back to the pool either way (dropping an uncommitted
//! session rolls back as well).
//!
//! Every upsert is a single `INSERT ... SELECT * FROM UNNEST(...)` statement,
//! so a batch costs one round-trip per table regardless of its size.
//! Postgres rejects an `ON CONFLICT DO UPDATE` that touches the same row
//! twice within one statement, so rows sharing a conflict key are collapsed
//! first, keeping the last occurrence.
//!
//! ```text
//! accounts
//!   +-- posts (account_id)
//!         +-- post_statistics_actual   (post_id)
//!         +-- post_statistics_expected (post_id)
//!         +-- expanded_links           (post_id)
//!         +-- media                    (post_id)
//!         +-- post_dashboards          (post_id)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use async_trait::async_trait;
use crowdtangle_types::{Account, DashboardId, ExpandedLink, Media, Post, PostId, PostStatistics};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Source of transactional write sessions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The session type this store opens.
    type Session: RecordSession;

    /// Acquire a connection and begin a transaction on it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if no connection can be acquired or `BEGIN` fails.
    async fn begin(&self) -> Result<Self::Session, DbError>;
}

/// The six idempotent writes of a batch, inside one transaction.
#[async_trait]
pub trait RecordSession: Send {
    /// Insert or update accounts by id.
    async fn upsert_accounts(&mut self, accounts: &[Account]) -> Result<(), DbError>;

    /// Insert or update posts by id.
    async fn upsert_posts(&mut self, posts: &[&Post]) -> Result<(), DbError>;

    /// Insert or update actual and expected statistics by post id.
    async fn upsert_statistics(
        &mut self,
        actual: &[&PostStatistics],
        expected: &[&PostStatistics],
    ) -> Result<(), DbError>;

    /// Insert or update expanded links by `(post_id, original)`.
    async fn upsert_expanded_links(&mut self, links: &[&ExpandedLink]) -> Result<(), DbError>;

    /// Insert or update media by `(post_id, url_full)`.
    async fn upsert_media(&mut self, media: &[&Media]) -> Result<(), DbError>;

    /// Associate posts with the dashboards they were fetched through.
    async fn insert_post_dashboards(
        &mut self,
        dashboards: &BTreeMap<PostId, DashboardId>,
    ) -> Result<(), DbError>;

    /// Commit the transaction and release the connection.
    async fn commit(self) -> Result<(), DbError>;

    /// Roll the transaction back and release the connection.
    async fn rollback(self) -> Result<(), DbError>;
}

/// [`RecordStore`] backed by a `PostgreSQL` connection pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a store drawing connections from `pool`.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a store sharing the pool of a connected [`PostgresPool`].
    pub fn from_pool(pool: &PostgresPool) -> Self {
        Self::new(pool.pool().clone())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    type Session = PgSession;

    async fn begin(&self) -> Result<PgSession, DbError> {
        let tx = self.pool.begin().await?;
        Ok(PgSession { tx })
    }
}

/// An open transaction on a pooled `PostgreSQL` connection.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RecordSession for PgSession {
    async fn upsert_accounts(&mut self, accounts: &[Account]) -> Result<(), DbError> {
        let rows = last_by_key(accounts.iter(), |a| a.id);
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut ids = Vec::with_capacity(len);
        let mut account_types = Vec::with_capacity(len);
        let mut handles = Vec::with_capacity(len);
        let mut names = Vec::with_capacity(len);
        let mut profile_images = Vec::with_capacity(len);
        let mut subscriber_counts = Vec::with_capacity(len);
        let mut urls = Vec::with_capacity(len);
        let mut platforms = Vec::with_capacity(len);
        let mut platform_ids = Vec::with_capacity(len);
        let mut admin_countries = Vec::with_capacity(len);
        let mut verified = Vec::with_capacity(len);
        let mut updated = Vec::with_capacity(len);

        for account in &rows {
            ids.push(account.id.into_inner());
            account_types.push(account.account_type.clone());
            handles.push(account.handle.clone());
            names.push(account.name.clone());
            profile_images.push(account.profile_image.clone());
            subscriber_counts.push(account.subscriber_count);
            urls.push(account.url.clone());
            platforms.push(account.platform.clone());
            platform_ids.push(account.platform_id.clone());
            admin_countries.push(account.page_admin_top_country.clone());
            verified.push(account.verified);
            updated.push(account.updated);
        }

        sqlx::query(
            r"INSERT INTO accounts (id, account_type, handle, name, profile_image, subscriber_count, url, platform, platform_id, page_admin_top_country, verified, updated)
              SELECT * FROM UNNEST($1::BIGINT[], $2::TEXT[], $3::TEXT[], $4::TEXT[], $5::TEXT[], $6::BIGINT[], $7::TEXT[], $8::TEXT[], $9::TEXT[], $10::TEXT[], $11::BOOLEAN[], $12::TIMESTAMPTZ[])
              ON CONFLICT (id) DO UPDATE SET
                account_type = EXCLUDED.account_type,
                handle = EXCLUDED.handle,
                name = EXCLUDED.name,
                profile_image = EXCLUDED.profile_image,
                subscriber_count = EXCLUDED.subscriber_count,
                url = EXCLUDED.url,
                platform = EXCLUDED.platform,
                platform_id = EXCLUDED.platform_id,
                page_admin_top_country = EXCLUDED.page_admin_top_country,
                verified = EXCLUDED.verified,
                updated = EXCLUDED.updated",
        )
        .bind(&ids)
        .bind(&account_types)
        .bind(&handles)
        .bind(&names)
        .bind(&profile_images)
        .bind(&subscriber_counts)
        .bind(&urls)
        .bind(&platforms)
        .bind(&platform_ids)
        .bind(&admin_countries)
        .bind(&verified)
        .bind(&updated)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(count = len, "Upserted accounts");
        Ok(())
    }

    async fn upsert_posts(&mut self, posts: &[&Post]) -> Result<(), DbError> {
        let rows = last_by_key(posts.iter().copied(), |p| p.id.clone());
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut ids = Vec::with_capacity(len);
        let mut account_ids = Vec::with_capacity(len);
        let mut platform_ids = Vec::with_capacity(len);
        let mut platforms = Vec::with_capacity(len);
        let mut post_types = Vec::with_capacity(len);
        let mut captions = Vec::with_capacity(len);
        let mut messages = Vec::with_capacity(len);
        let mut descriptions = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut links = Vec::with_capacity(len);
        let mut post_urls = Vec::with_capacity(len);
        let mut languages = Vec::with_capacity(len);
        let mut subscriber_counts = Vec::with_capacity(len);
        let mut scores = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut updated = Vec::with_capacity(len);

        for post in &rows {
            ids.push(post.id.as_str().to_owned());
            account_ids.push(post.account_id.into_inner());
            platform_ids.push(post.platform_id.clone());
            platforms.push(post.platform.clone());
            post_types.push(post.post_type.clone());
            captions.push(post.caption.clone());
            messages.push(post.message.clone());
            descriptions.push(post.description.clone());
            titles.push(post.title.clone());
            links.push(post.link.clone());
            post_urls.push(post.post_url.clone());
            languages.push(post.language.clone());
            subscriber_counts.push(post.subscriber_count);
            scores.push(post.score);
            dates.push(post.date);
            updated.push(post.updated);
        }

        sqlx::query(
            r"INSERT INTO posts (id, account_id, platform_id, platform, post_type, caption, message, description, title, link, post_url, language, subscriber_count, score, date, updated)
              SELECT * FROM UNNEST($1::TEXT[], $2::BIGINT[], $3::TEXT[], $4::TEXT[], $5::TEXT[], $6::TEXT[], $7::TEXT[], $8::TEXT[], $9::TEXT[], $10::TEXT[], $11::TEXT[], $12::TEXT[], $13::BIGINT[], $14::DOUBLE PRECISION[], $15::TIMESTAMPTZ[], $16::TIMESTAMPTZ[])
              ON CONFLICT (id) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                platform_id = EXCLUDED.platform_id,
                platform = EXCLUDED.platform,
                post_type = EXCLUDED.post_type,
                caption = EXCLUDED.caption,
                message = EXCLUDED.message,
                description = EXCLUDED.description,
                title = EXCLUDED.title,
                link = EXCLUDED.link,
                post_url = EXCLUDED.post_url,
                language = EXCLUDED.language,
                subscriber_count = EXCLUDED.subscriber_count,
                score = EXCLUDED.score,
                date = EXCLUDED.date,
                updated = EXCLUDED.updated",
        )
        .bind(&ids)
        .bind(&account_ids)
        .bind(&platform_ids)
        .bind(&platforms)
        .bind(&post_types)
        .bind(&captions)
        .bind(&messages)
        .bind(&descriptions)
        .bind(&titles)
        .bind(&links)
        .bind(&post_urls)
        .bind(&languages)
        .bind(&subscriber_counts)
        .bind(&scores)
        .bind(&dates)
        .bind(&updated)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(count = len, "Upserted posts");
        Ok(())
    }

    async fn upsert_statistics(
        &mut self,
        actual: &[&PostStatistics],
        expected: &[&PostStatistics],
    ) -> Result<(), DbError> {
        upsert_statistics_into(&mut self.tx, StatisticsTable::Actual, actual).await?;
        upsert_statistics_into(&mut self.tx, StatisticsTable::Expected, expected).await?;
        Ok(())
    }

    async fn upsert_expanded_links(&mut self, links: &[&ExpandedLink]) -> Result<(), DbError> {
        let rows = last_by_key(links.iter().copied(), |l| {
            (l.post_id.clone(), l.original.clone())
        });
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut post_ids = Vec::with_capacity(len);
        let mut originals = Vec::with_capacity(len);
        let mut expanded = Vec::with_capacity(len);

        for link in &rows {
            post_ids.push(link.post_id.as_str().to_owned());
            originals.push(link.original.clone());
            expanded.push(link.expanded.clone());
        }

        sqlx::query(
            r"INSERT INTO expanded_links (post_id, original, expanded)
              SELECT * FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[])
              ON CONFLICT (post_id, original) DO UPDATE SET
                expanded = EXCLUDED.expanded",
        )
        .bind(&post_ids)
        .bind(&originals)
        .bind(&expanded)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(count = len, "Upserted expanded links");
        Ok(())
    }

    async fn upsert_media(&mut self, media: &[&Media]) -> Result<(), DbError> {
        let rows = last_by_key(media.iter().copied(), |m| {
            (m.post_id.clone(), m.url_full.clone())
        });
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut post_ids = Vec::with_capacity(len);
        let mut media_types = Vec::with_capacity(len);
        let mut urls_full = Vec::with_capacity(len);
        let mut urls = Vec::with_capacity(len);
        let mut widths = Vec::with_capacity(len);
        let mut heights = Vec::with_capacity(len);

        for item in &rows {
            post_ids.push(item.post_id.as_str().to_owned());
            media_types.push(item.media_type.clone());
            urls_full.push(item.url_full.clone());
            urls.push(item.url.clone());
            widths.push(item.width);
            heights.push(item.height);
        }

        sqlx::query(
            r"INSERT INTO media (post_id, media_type, url_full, url, width, height)
              SELECT * FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[], $4::TEXT[], $5::INTEGER[], $6::INTEGER[])
              ON CONFLICT (post_id, url_full) DO UPDATE SET
                media_type = EXCLUDED.media_type,
                url = EXCLUDED.url,
                width = EXCLUDED.width,
                height = EXCLUDED.height",
        )
        .bind(&post_ids)
        .bind(&media_types)
        .bind(&urls_full)
        .bind(&urls)
        .bind(&widths)
        .bind(&heights)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(count = len, "Upserted media");
        Ok(())
    }

    async fn insert_post_dashboards(
        &mut self,
        dashboards: &BTreeMap<PostId, DashboardId>,
    ) -> Result<(), DbError> {
        if dashboards.is_empty() {
            return Ok(());
        }

        let post_ids: Vec<String> = dashboards.keys().map(|id| id.as_str().to_owned()).collect();
        let dashboard_ids: Vec<i64> = dashboards.values().map(|id| id.into_inner()).collect();

        sqlx::query(
            r"INSERT INTO post_dashboards (post_id, dashboard_id)
              SELECT * FROM UNNEST($1::TEXT[], $2::BIGINT[])
              ON CONFLICT DO NOTHING",
        )
        .bind(&post_ids)
        .bind(&dashboard_ids)
        .execute(&mut *self.tx)
        .await?;

        tracing::debug!(count = dashboards.len(), "Inserted post dashboards");
        Ok(())
    }

    async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// The two tables sharing the statistics row shape.
#[derive(Debug, Clone, Copy)]
enum StatisticsTable {
    Actual,
    Expected,
}

impl StatisticsTable {
    const fn upsert_sql(self) -> &'static str {
        match self {
            Self::Actual => {
                r"INSERT INTO post_statistics_actual (post_id, like_count, share_count, comment_count, love_count, wow_count, haha_count, sad_count, angry_count, thankful_count, care_count)
                  SELECT * FROM UNNEST($1::TEXT[], $2::BIGINT[], $3::BIGINT[], $4::BIGINT[], $5::BIGINT[], $6::BIGINT[], $7::BIGINT[], $8::BIGINT[], $9::BIGINT[], $10::BIGINT[], $11::BIGINT[])
                  ON CONFLICT (post_id) DO UPDATE SET
                    like_count = EXCLUDED.like_count,
                    share_count = EXCLUDED.share_count,
                    comment_count = EXCLUDED.comment_count,
                    love_count = EXCLUDED.love_count,
                    wow_count = EXCLUDED.wow_count,
                    haha_count = EXCLUDED.haha_count,
                    sad_count = EXCLUDED.sad_count,
                    angry_count = EXCLUDED.angry_count,
                    thankful_count = EXCLUDED.thankful_count,
                    care_count = EXCLUDED.care_count"
            }
            Self::Expected => {
                r"INSERT INTO post_statistics_expected (post_id, like_count, share_count, comment_count, love_count, wow_count, haha_count, sad_count, angry_count, thankful_count, care_count)
                  SELECT * FROM UNNEST($1::TEXT[], $2::BIGINT[], $3::BIGINT[], $4::BIGINT[], $5::BIGINT[], $6::BIGINT[], $7::BIGINT[], $8::BIGINT[], $9::BIGINT[], $10::BIGINT[], $11::BIGINT[])
                  ON CONFLICT (post_id) DO UPDATE SET
                    like_count = EXCLUDED.like_count,
                    share_count = EXCLUDED.share_count,
                    comment_count = EXCLUDED.comment_count,
                    love_count = EXCLUDED.love_count,
                    wow_count = EXCLUDED.wow_count,
                    haha_count = EXCLUDED.haha_count,
                    sad_count = EXCLUDED.sad_count,
                    angry_count = EXCLUDED.angry_count,
                    thankful_count = EXCLUDED.thankful_count,
                    care_count = EXCLUDED.care_count"
            }
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Expected => "expected",
        }
    }
}

async fn upsert_statistics_into(
    tx: &mut Transaction<'static, Postgres>,
    table: StatisticsTable,
    statistics: &[&PostStatistics],
) -> Result<(), DbError> {
    let rows = last_by_key(statistics.iter().copied(), |s| s.post_id.clone());
    if rows.is_empty() {
        return Ok(());
    }

    let len = rows.len();
    let mut post_ids = Vec::with_capacity(len);
    let mut likes = Vec::with_capacity(len);
    let mut shares = Vec::with_capacity(len);
    let mut comments = Vec::with_capacity(len);
    let mut loves = Vec::with_capacity(len);
    let mut wows = Vec::with_capacity(len);
    let mut hahas = Vec::with_capacity(len);
    let mut sads = Vec::with_capacity(len);
    let mut angrys = Vec::with_capacity(len);
    let mut thankfuls = Vec::with_capacity(len);
    let mut cares = Vec::with_capacity(len);

    for stats in &rows {
        post_ids.push(stats.post_id.as_str().to_owned());
        likes.push(stats.like_count);
        shares.push(stats.share_count);
        comments.push(stats.comment_count);
        loves.push(stats.love_count);
        wows.push(stats.wow_count);
        hahas.push(stats.haha_count);
        sads.push(stats.sad_count);
        angrys.push(stats.angry_count);
        thankfuls.push(stats.thankful_count);
        cares.push(stats.care_count);
    }

    sqlx::query(table.upsert_sql())
        .bind(&post_ids)
        .bind(&likes)
        .bind(&shares)
        .bind(&comments)
        .bind(&loves)
        .bind(&wows)
        .bind(&hahas)
        .bind(&sads)
        .bind(&angrys)
        .bind(&thankfuls)
        .bind(&cares)
        .execute(&mut **tx)
        .await?;

    tracing::debug!(count = len, table = table.label(), "Upserted post statistics");
    Ok(())
}

/// Collapse rows sharing a key, keeping the last occurrence of each key at
/// the position where the key was first seen.
fn last_by_key<'a, T, K, I, F>(rows: I, key: F) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut slot_by_key: HashMap<K, usize> = HashMap::new();
    let mut kept: Vec<&'a T> = Vec::new();

    for row in rows {
        match slot_by_key.get(&key(row)).and_then(|&slot| kept.get_mut(slot)) {
            Some(existing) => *existing = row,
            None => {
                slot_by_key.insert(key(row), kept.len());
                kept.push(row);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_by_key_keeps_last_occurrence_in_first_seen_order() {
        let rows = [("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)];
        let kept = last_by_key(rows.iter(), |(k, _)| *k);
        assert_eq!(kept, vec![&("a", 3), &("b", 5), &("c", 4)]);
    }

    #[test]
    fn last_by_key_on_empty_input() {
        let rows: [(u8, u8); 0] = [];
        assert!(last_by_key(rows.iter(), |(k, _)| *k).is_empty());
    }

    #[test]
    fn statistics_tables_target_distinct_relations() {
        assert!(StatisticsTable::Actual
            .upsert_sql()
            .contains("INTO post_statistics_actual"));
        assert!(StatisticsTable::Expected
            .upsert_sql()
            .contains("INTO post_statistics_expected"));
    }
}
