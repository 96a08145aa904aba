//! Record structs delivered by the upstream processing stage.
//!
//! These mirror the rows the writer persists. Each [`EncapsulatedPost`]
//! bundles one post with everything that hangs off it, so a batch of them is
//! self-contained and can be written in foreign-key order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, DashboardId, PostId};

/// An account (page, group, or profile) that authored a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// CrowdTangle account id.
    pub id: AccountId,
    /// Account kind as reported upstream (`facebook_page`, `facebook_group`, ...).
    #[serde(default)]
    pub account_type: Option<String>,
    /// Handle, when the platform exposes one.
    #[serde(default)]
    pub handle: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Profile image URL.
    #[serde(default)]
    pub profile_image: Option<String>,
    /// Subscriber count at the time the record was fetched.
    #[serde(default)]
    pub subscriber_count: Option<i64>,
    /// Canonical account URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Platform name (`Facebook`, `Instagram`).
    #[serde(default)]
    pub platform: Option<String>,
    /// Platform-native account id.
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Country code of the page admins, if disclosed.
    #[serde(default)]
    pub page_admin_top_country: Option<String>,
    /// Whether the platform marks the account as verified.
    #[serde(default)]
    pub verified: Option<bool>,
    /// When this snapshot of the account was last updated upstream.
    pub updated: DateTime<Utc>,
}

/// A single post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// CrowdTangle post id.
    pub id: PostId,
    /// Authoring account.
    pub account_id: AccountId,
    /// Platform-native post id.
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Platform name.
    #[serde(default)]
    pub platform: Option<String>,
    /// Post kind (`link`, `photo`, `native_video`, ...).
    #[serde(default)]
    pub post_type: Option<String>,
    /// Caption text.
    #[serde(default)]
    pub caption: Option<String>,
    /// Body text.
    #[serde(default)]
    pub message: Option<String>,
    /// Link preview description.
    #[serde(default)]
    pub description: Option<String>,
    /// Link preview title.
    #[serde(default)]
    pub title: Option<String>,
    /// Primary link attached to the post.
    #[serde(default)]
    pub link: Option<String>,
    /// URL of the post itself.
    #[serde(default)]
    pub post_url: Option<String>,
    /// Language code.
    #[serde(default)]
    pub language: Option<String>,
    /// Account subscriber count when the post was published.
    #[serde(default)]
    pub subscriber_count: Option<i64>,
    /// Overperformance score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Publication time.
    pub date: DateTime<Utc>,
    /// Last update time upstream.
    pub updated: DateTime<Utc>,
}

/// Interaction counts for a post.
///
/// The same shape carries both actual and expected (benchmark) statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostStatistics {
    /// The post these counts belong to.
    pub post_id: PostId,
    /// Likes.
    pub like_count: Option<i64>,
    /// Shares.
    pub share_count: Option<i64>,
    /// Comments.
    pub comment_count: Option<i64>,
    /// Love reactions.
    pub love_count: Option<i64>,
    /// Wow reactions.
    pub wow_count: Option<i64>,
    /// Haha reactions.
    pub haha_count: Option<i64>,
    /// Sad reactions.
    pub sad_count: Option<i64>,
    /// Angry reactions.
    pub angry_count: Option<i64>,
    /// Thankful reactions.
    pub thankful_count: Option<i64>,
    /// Care reactions.
    pub care_count: Option<i64>,
}

/// A shortened link found in a post together with its resolved target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedLink {
    /// The post containing the link.
    pub post_id: PostId,
    /// Link as it appeared in the post.
    pub original: String,
    /// Link after redirects were followed.
    pub expanded: String,
}

/// A media attachment (photo or video) of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// The post carrying the attachment.
    pub post_id: PostId,
    /// `photo` or `video`.
    #[serde(default)]
    pub media_type: Option<String>,
    /// Full-resolution URL.
    pub url_full: String,
    /// Display URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Width in pixels.
    #[serde(default)]
    pub width: Option<i32>,
    /// Height in pixels.
    #[serde(default)]
    pub height: Option<i32>,
}

/// One post together with every record that depends on it.
///
/// This is the unit handed to the writer; a batch is a slice of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncapsulatedPost {
    /// The post.
    pub post: Post,
    /// The authoring account as seen when this post was fetched.
    pub account: Account,
    /// Observed interaction counts.
    pub statistics_actual: PostStatistics,
    /// Benchmark interaction counts.
    pub statistics_expected: PostStatistics,
    /// Links found in the post.
    #[serde(default)]
    pub expanded_links: Vec<ExpandedLink>,
    /// Media attachments.
    #[serde(default)]
    pub media_list: Vec<Media>,
    /// Dashboard the post was retrieved through.
    pub dashboard_id: DashboardId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encapsulated_post_parses_with_optional_fields_omitted() {
        let json = r#"{
            "post": {
                "id": "1|2",
                "account_id": 1,
                "date": "2021-03-01T12:00:00Z",
                "updated": "2021-03-02T12:00:00Z"
            },
            "account": { "id": 1, "updated": "2021-03-02T12:00:00Z" },
            "statistics_actual": { "post_id": "1|2", "like_count": 5 },
            "statistics_expected": { "post_id": "1|2" },
            "dashboard_id": 9
        }"#;

        let record: EncapsulatedPost = serde_json::from_str(json).unwrap();
        assert_eq!(record.post.id, PostId::from("1|2"));
        assert_eq!(record.account.id, AccountId(1));
        assert_eq!(record.statistics_actual.like_count, Some(5));
        assert_eq!(record.statistics_expected.like_count, None);
        assert!(record.expanded_links.is_empty());
        assert!(record.media_list.is_empty());
        assert_eq!(record.dashboard_id, DashboardId(9));
    }
}
