//! Tests for Redis key construction and retention values.
//!
//! Store behavior against a live Redis is covered by integration
//! environments; these tests pin the key schema that replays and operators
//! depend on.

use super::*;

#[test]
fn test_dedup_key_schema() {
    assert_eq!(dedup_key("E1"), "dedup:event:E1");
}

#[test]
fn test_rate_key_schema() {
    assert_eq!(rate_key("A1"), "rate:limit:A1");
}

/// The dedup window is 24 hours; beyond it duplicates cannot be suppressed.
#[test]
fn test_dedup_retention_is_24_hours() {
    assert_eq!(DEDUP_TTL, Duration::from_secs(86_400));
}
