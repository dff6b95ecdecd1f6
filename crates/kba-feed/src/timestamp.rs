//! Feed timestamps: `YYYYMMDDhhmmss` in Japan Standard Time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Asia::Tokyo;

use crate::client::FeedError;

pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Current time as a feed timestamp.
pub fn now_stamp() -> String {
    stamp_at(Utc::now())
}

/// Midnight (JST) of the current feed day.
pub fn today_stamp() -> String {
    let today = Utc::now().with_timezone(&Tokyo).date_naive();
    format!("{}000000", today.format("%Y%m%d"))
}

pub fn stamp_at(at: DateTime<Utc>) -> String {
    at.with_timezone(&Tokyo).format(STAMP_FORMAT).to_string()
}

/// Normalize a user-supplied start point.
///
/// `YYYYMMDD` expands to midnight; `YYYYMMDDhhmmss` must be a real instant.
pub fn normalize_from(arg: &str) -> Result<String, FeedError> {
    let s = arg.trim();
    let invalid = || FeedError::InvalidTimestamp(arg.to_string());
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match s.len() {
        8 => {
            NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| invalid())?;
            Ok(format!("{s}000000"))
        }
        14 => {
            NaiveDateTime::parse_from_str(s, STAMP_FORMAT).map_err(|_| invalid())?;
            Ok(s.to_string())
        }
        _ => Err(invalid()),
    }
}

/// Leading 14-digit stamp of a string, if present.
pub fn leading_stamp(s: &str) -> Option<&str> {
    let head = s.get(..14)?;
    head.bytes().all(|b| b.is_ascii_digit()).then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_expands_to_midnight() {
        assert_eq!(normalize_from("20240101").unwrap(), "20240101000000");
        assert_eq!(normalize_from("20240101123000").unwrap(), "20240101123000");
    }

    #[test]
    fn rejects_malformed_stamps() {
        for bad in ["2024010", "20241301", "2024010112", "20240101256000", "abcdefgh"] {
            assert!(normalize_from(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn stamps_are_in_jst() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap();
        assert_eq!(stamp_at(at), "20240102003000");
    }

    #[test]
    fn today_is_midnight() {
        let s = today_stamp();
        assert_eq!(s.len(), 14);
        assert!(s.ends_with("000000"));
    }

    #[test]
    fn leading_stamp_needs_fourteen_digits() {
        assert_eq!(leading_stamp("20240101000000_x"), Some("20240101000000"));
        assert_eq!(leading_stamp("2024"), None);
        assert_eq!(leading_stamp("2024010100000a"), None);
    }
}
