// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules over the raw connection.
//!
//! Timestamps are stored as `%Y-%m-%dT%H:%M:%S%.3fZ` UTC text: fixed-width,
//! so SQL string comparison equals chronological comparison.

pub mod posts;
pub mod snapshots;

use chrono::{DateTime, Utc};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp for storage.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp back, attributing failures to column `idx`.
pub(crate) fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Parse a stored JSON column, attributing failures to column `idx`.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
