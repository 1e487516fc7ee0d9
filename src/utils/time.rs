//! Timestamp helpers
//!
//! All persisted timestamps are RFC 3339 UTC with fixed microsecond
//! precision, so the string columns order lexicographically the same way
//! they order chronologically and watermark comparisons can run in SQL.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current server time in the canonical stored format.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a caller-supplied timestamp (any RFC 3339 offset) and normalize
/// it to the canonical stored format. Returns the original input on
/// failure so the caller can report it.
pub fn normalize(value: &str) -> Result<String, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        })
        .map_err(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_converts_offset_to_utc() {
        let ts = normalize("2025-03-01T12:00:00+02:00").unwrap();
        assert_eq!(ts, "2025-03-01T10:00:00.000000Z");
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize("not-a-date").is_err());
        assert!(normalize("").is_err());
    }

    #[test]
    fn canonical_format_orders_lexicographically() {
        let earlier = normalize("2025-03-01T10:00:00.5Z").unwrap();
        let later = normalize("2025-03-01T10:00:01Z").unwrap();
        assert!(earlier < later);
    }
}
