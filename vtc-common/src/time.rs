//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp the way it is persisted (RFC 3339, millisecond precision)
pub fn to_db_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted timestamp
pub fn from_db_string(s: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Failed to parse timestamp '{}': {}", s, e)))
}

/// Parse an optional persisted timestamp column
pub fn from_db_opt(s: Option<String>) -> crate::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(from_db_string).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_db_string_roundtrip_keeps_millis() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:30:45.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let s = to_db_string(ts);
        assert_eq!(s, "2024-05-01T12:30:45.123Z");
        assert_eq!(from_db_string(&s).unwrap(), ts);
    }

    #[test]
    fn test_from_db_string_rejects_garbage() {
        assert!(from_db_string("yesterday").is_err());
    }

    #[test]
    fn test_from_db_opt_none() {
        assert!(from_db_opt(None).unwrap().is_none());
    }
}
