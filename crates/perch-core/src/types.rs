// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Perch workspace.
//!
//! Numeric fields on [`ScrapedRecord`] deserialize leniently: missing, null,
//! or unparseable counts coerce to 0. This is the single edge where external
//! numbers enter the system; everything downstream can rely on non-negative
//! counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stored content for records scraped without any text.
pub const PLACEHOLDER_CONTENT: &str = "(no content)";

/// Lifecycle status of a [`Post`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Processing,
    Sent,
    Failed,
    /// Ingested record that failed a quality check; retained for review,
    /// excluded from default listings and aggregates.
    Quarantine,
    /// Marked missing by reconciliation; always reversible, never a hard delete.
    DeletedOnX,
}

/// Which component wrote a [`LogEntry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogActor {
    User,
    Orchestrator,
    Sync,
    Import,
}

/// One entry in a post's append-only trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub actor: LogActor,
    pub message: String,
}

impl LogEntry {
    pub fn new(at: DateTime<Utc>, actor: LogActor, message: impl Into<String>) -> Self {
        Self {
            at,
            actor,
            message: message.into(),
        }
    }
}

/// Engagement counters carried on every post. Never negative; default 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub views: i64,
    pub likes: i64,
    pub reposts: i64,
    pub bookmarks: i64,
    pub replies: i64,
    pub url_clicks: i64,
    pub profile_clicks: i64,
    pub detail_expands: i64,
}

impl EngagementCounters {
    /// Likes plus reposts, the interaction numerator for engagement rates.
    pub fn interactions(&self) -> i64 {
        self.likes + self.reposts
    }
}

/// A schedulable content unit with a lifecycle status.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub account: String,
    pub content: String,
    /// Local paths or remote URLs for attached media.
    pub media_refs: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Self-reference enabling reply threads. Never equals `id`.
    pub parent_id: Option<i64>,
    /// Platform-assigned id, known only after successful publication.
    pub external_id: Option<String>,
    pub metrics: EngagementCounters,
    pub is_repost: bool,
    pub logs: Vec<LogEntry>,
}

impl Post {
    /// Whether the stored content is empty or the scrape placeholder.
    pub fn has_placeholder_content(&self) -> bool {
        self.content.is_empty() || self.content == PLACEHOLDER_CONTENT
    }
}

/// Fields for creating a user-authored draft.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub account: String,
    pub content: String,
    pub media_refs: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub parent_id: Option<i64>,
}

/// Partial update for a post; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub content: Option<String>,
    pub media_refs: Option<Vec<String>>,
    /// `Some(None)` clears the schedule, `Some(Some(t))` sets it.
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    pub parent_id: Option<Option<i64>>,
    pub status: Option<PostStatus>,
}

/// Listing filter for [`crate::PostStore::list_posts`].
#[derive(Debug, Clone)]
pub struct PostFilter {
    pub account: Option<String>,
    pub status: Option<PostStatus>,
    /// Quarantined rows are hidden from default listings.
    pub include_quarantine: bool,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            account: None,
            status: None,
            include_quarantine: false,
            limit: None,
            offset: 0,
        }
    }
}

/// Immutable timestamped metric reading for one post.
///
/// Tracks the five counters the time series is built from. Append-only:
/// never mutated, deleted only with the parent post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetricSnapshot {
    pub id: i64,
    pub post_id: i64,
    pub views: i64,
    pub likes: i64,
    pub reposts: i64,
    pub bookmarks: i64,
    pub replies: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Immutable timestamped follower/following pair for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMetricSnapshot {
    pub id: i64,
    pub account: String,
    pub followers: i64,
    pub following: i64,
    pub recorded_at: DateTime<Utc>,
}

/// One post record as observed on the remote platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub likes: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub reposts: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub bookmarks: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub replies: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub url_clicks: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub profile_clicks: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub detail_expands: i64,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Rendered date string, less reliable than the id-derived timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub is_repost: bool,
}

impl ScrapedRecord {
    pub fn counters(&self) -> EngagementCounters {
        EngagementCounters {
            views: self.views,
            likes: self.likes,
            reposts: self.reposts,
            bookmarks: self.bookmarks,
            replies: self.replies,
            url_clicks: self.url_clicks,
            profile_clicks: self.profile_clicks,
            detail_expands: self.detail_expands,
        }
    }
}

/// Follower stats scraped from the account profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default, deserialize_with = "lenient_count")]
    pub followers: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub following: i64,
}

/// A publish request handed to the Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub account: String,
    pub content: String,
    pub media_refs: Vec<String>,
    /// Parent's platform id when publishing a thread reply.
    pub reply_to_external_id: Option<String>,
}

/// Normalized result of an Agent publish call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl PublishOutcome {
    pub fn failure(log: impl Into<String>) -> Self {
        Self {
            success: false,
            log: log.into(),
            external_id: None,
        }
    }
}

/// The counters a direct metric scrape can read off a single post page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReading {
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub likes: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub reposts: i64,
}

/// Normalized result of an Agent metric scrape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsOutcome {
    pub success: bool,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub metrics: MetricsReading,
}

/// Normalized result of an Agent full-history scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub posts: Vec<ScrapedRecord>,
    #[serde(default)]
    pub profile: Option<ProfileStats>,
    /// Oldest timestamp the scan reliably covered; bounds deletion detection.
    #[serde(default)]
    pub scan_horizon: Option<DateTime<Utc>>,
}

/// Normalized result of an Agent single-post import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub record: Option<ScrapedRecord>,
}

/// Coerce missing, null, or unparseable numeric values to 0, clamping
/// negatives. Applied at deserialization so counters are trustworthy
/// everywhere downstream.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

fn coerce_count(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0)
            .max(0),
        serde_json::Value::String(s) => s.trim().parse::<i64>().unwrap_or(0).max(0),
        _ => 0,
    }
}
