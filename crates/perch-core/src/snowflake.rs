// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish-time derivation from platform post ids.
//!
//! The platform's numeric ids embed a millisecond timestamp in the high
//! bits. Deriving the publish time from the id is more reliable than any
//! rendered date string the scraper can read, so reconciliation prefers it.

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds offset of the platform's id epoch from the Unix epoch.
const ID_EPOCH_MS: i64 = 1_288_834_974_657;

/// Bits below the timestamp portion of an id (worker + sequence).
const TIMESTAMP_SHIFT: u32 = 22;

/// Derive the publish time embedded in a platform id.
///
/// Returns `None` for non-numeric ids and for values too small to carry a
/// timestamp (the timestamp portion must be non-zero), so callers can fall
/// through to the scraped date string.
pub fn published_at_from_id(external_id: &str) -> Option<DateTime<Utc>> {
    let id: u64 = external_id.trim().parse().ok()?;
    let offset_ms = id >> TIMESTAMP_SHIFT;
    if offset_ms == 0 {
        return None;
    }
    let ms = ID_EPOCH_MS.checked_add(i64::try_from(offset_ms).ok()?)?;
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn derives_timestamp_from_real_looking_id() {
        // 1580661436348573696 >> 22 maps to 2022-10-13T20:47:08Z.
        let dt = published_at_from_id("1580661436348573696");
        assert!(dt.is_some());
        let dt = dt.unwrap();
        assert_eq!(dt.year(), 2022);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 13);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(published_at_from_id("abc123").is_none());
        assert!(published_at_from_id("").is_none());
    }

    #[test]
    fn rejects_ids_without_a_timestamp_portion() {
        // Anything below 2^22 has no timestamp bits set.
        assert!(published_at_from_id("12345").is_none());
        assert!(published_at_from_id("0").is_none());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = published_at_from_id("1580661436348573696");
        let b = published_at_from_id("1580661436348573696");
        assert_eq!(a, b);
    }

    #[test]
    fn larger_ids_derive_later_timestamps() {
        let earlier = published_at_from_id("1580661436348573696").unwrap();
        let later = published_at_from_id("1680661436348573696").unwrap();
        assert!(later > earlier);
    }
}
