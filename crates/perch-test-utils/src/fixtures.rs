// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture builders shared by engine and storage tests.

use perch_core::{ScrapedRecord, SyncOutcome};

/// A scraped record with the given id, content, and headline counters.
pub fn scraped_record(external_id: &str, content: &str, views: i64, likes: i64) -> ScrapedRecord {
    ScrapedRecord {
        external_id: external_id.to_string(),
        content: content.to_string(),
        views,
        likes,
        ..Default::default()
    }
}

/// A successful sync outcome carrying the given records, no profile and no
/// scan horizon.
pub fn sync_outcome(posts: Vec<ScrapedRecord>) -> SyncOutcome {
    SyncOutcome {
        success: true,
        log: "fixture sync".to_string(),
        posts,
        profile: None,
        scan_horizon: None,
    }
}
