//! Type conversion registry.
//!
//! Maps a trimmed fixed-width text token to a typed [`Value`]. Every
//! conversion is a pure function of its input: blank (and, where the feed
//! uses it, all-zero) input is `Null`, malformed non-empty input is a
//! [`ConversionError`]. Nothing returns a sentinel.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::value::Value;

/// Decimal places used by the fixed one-place specializations
/// (race time, lap time, weight, odds).
pub const DEFAULT_DECIMAL_PLACES: u32 = 1;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The conversion type name is not in the registry.
    UnknownType(String),
    /// The value is non-empty but does not fit the conversion.
    Invalid {
        type_name: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnknownType(name) => {
                write!(f, "unknown conversion type '{name}'")
            }
            ConversionError::Invalid {
                type_name,
                value,
                reason,
            } => write!(f, "cannot convert '{value}' to {type_name}: {reason}"),
        }
    }
}

impl std::error::Error for ConversionError {}

// ---------------------------------------------------------------------------
// Conversion kinds
// ---------------------------------------------------------------------------

/// A registered conversion, attached to a field in a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// `YYYYMMDD`
    Date,
    /// `HHMM`, or the trailing `HHMM` of an `MMDDHHMM` announcement stamp.
    Time,
    Int,
    /// Integer scaled down by `10^places`.
    Decimal { places: u32 },
    /// Seconds, one decimal place.
    RaceTime,
    /// Seconds, one decimal place.
    LapTime,
    /// Kilograms, one decimal place.
    Weight,
    /// Payout multiplier, one decimal place.
    Odds,
    /// Integer count of thousands; no scaling.
    PrizeMoney,
    /// `MMDD` kept as its integer value ("0101" -> 101).
    MonthDay,
}

impl Conversion {
    /// Resolve a registry type name (case-insensitive).
    ///
    /// `places` only applies to `DECIMAL`; it defaults to one place.
    pub fn from_name(name: &str, places: Option<u32>) -> Result<Self, ConversionError> {
        let c = match name.trim().to_ascii_uppercase().as_str() {
            "DATE" => Conversion::Date,
            "TIME" => Conversion::Time,
            "INT" | "SMALLINT" | "INTEGER" => Conversion::Int,
            "DECIMAL" => Conversion::Decimal {
                places: places.unwrap_or(DEFAULT_DECIMAL_PLACES),
            },
            "RACE_TIME" => Conversion::RaceTime,
            "LAP_TIME" => Conversion::LapTime,
            "WEIGHT" => Conversion::Weight,
            "ODDS" => Conversion::Odds,
            "PRIZE_MONEY" => Conversion::PrizeMoney,
            "MONTH_DAY" => Conversion::MonthDay,
            _ => return Err(ConversionError::UnknownType(name.to_string())),
        };
        Ok(c)
    }

    /// Canonical registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Conversion::Date => "DATE",
            Conversion::Time => "TIME",
            Conversion::Int => "INT",
            Conversion::Decimal { .. } => "DECIMAL",
            Conversion::RaceTime => "RACE_TIME",
            Conversion::LapTime => "LAP_TIME",
            Conversion::Weight => "WEIGHT",
            Conversion::Odds => "ODDS",
            Conversion::PrizeMoney => "PRIZE_MONEY",
            Conversion::MonthDay => "MONTH_DAY",
        }
    }

    /// Apply this conversion to a raw token. Surrounding whitespace is ignored.
    pub fn apply(&self, raw: &str) -> Result<Value, ConversionError> {
        match self {
            Conversion::Date => to_date(raw),
            Conversion::Time => to_time(raw),
            Conversion::Int | Conversion::PrizeMoney => to_int(raw, self.name()),
            Conversion::Decimal { places } => to_decimal(raw, *places, self.name()),
            Conversion::RaceTime
            | Conversion::LapTime
            | Conversion::Weight
            | Conversion::Odds => to_decimal(raw, DEFAULT_DECIMAL_PLACES, self.name()),
            Conversion::MonthDay => to_month_day(raw),
        }
    }
}

/// Registry entry point: convert `value` with the conversion named `type_name`.
pub fn convert_value(
    value: &str,
    type_name: &str,
    places: Option<u32>,
) -> Result<Value, ConversionError> {
    Conversion::from_name(type_name, places)?.apply(value)
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

fn invalid(type_name: &'static str, value: &str, reason: impl Into<String>) -> ConversionError {
    ConversionError::Invalid {
        type_name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn all_zeros(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b'0')
}

/// Parse a run of ASCII digits (no sign). Used for calendar components.
fn digits(type_name: &'static str, whole: &str, part: &str) -> Result<u32, ConversionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(type_name, whole, "expected digits"));
    }
    part.parse::<u32>()
        .map_err(|e| invalid(type_name, whole, e.to_string()))
}

fn to_date(raw: &str) -> Result<Value, ConversionError> {
    let s = raw.trim();
    if s.is_empty() || all_zeros(s) {
        return Ok(Value::Null);
    }
    if s.len() != 8 || !s.is_ascii() {
        return Err(invalid("DATE", s, "expected YYYYMMDD"));
    }

    let year = digits("DATE", s, &s[0..4])?;
    let month = digits("DATE", s, &s[4..6])?;
    let day = digits("DATE", s, &s[6..8])?;

    if !(1900..=2100).contains(&year) {
        return Err(invalid("DATE", s, format!("year {year} out of range")));
    }
    if !(1..=12).contains(&month) {
        return Err(invalid("DATE", s, format!("month {month} out of range")));
    }
    if !(1..=31).contains(&day) {
        return Err(invalid("DATE", s, format!("day {day} out of range")));
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .map(Value::Date)
        .ok_or_else(|| invalid("DATE", s, "not a calendar date"))
}

fn to_time(raw: &str) -> Result<Value, ConversionError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(Value::Null);
    }
    if !s.is_ascii() {
        return Err(invalid("TIME", s, "expected HHMM or MMDDHHMM"));
    }
    let hhmm = match s.len() {
        4 => s,
        8 => &s[4..8],
        _ => return Err(invalid("TIME", s, "expected HHMM or MMDDHHMM")),
    };

    let hour = digits("TIME", s, &hhmm[0..2])?;
    let minute = digits("TIME", s, &hhmm[2..4])?;
    if hour > 23 {
        return Err(invalid("TIME", s, format!("hour {hour} out of range")));
    }
    if minute > 59 {
        return Err(invalid("TIME", s, format!("minute {minute} out of range")));
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
        .map(Value::Time)
        .ok_or_else(|| invalid("TIME", s, "not a clock time"))
}

fn parse_i64(type_name: &'static str, s: &str) -> Result<i64, ConversionError> {
    match s.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(_) if all_zeros(s) => Ok(0),
        Err(e) => Err(invalid(type_name, s, e.to_string())),
    }
}

fn to_int(raw: &str, type_name: &'static str) -> Result<Value, ConversionError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(Value::Null);
    }
    parse_i64(type_name, s).map(Value::Int)
}

fn to_decimal(raw: &str, places: u32, type_name: &'static str) -> Result<Value, ConversionError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(Value::Null);
    }
    let n = parse_i64(type_name, s)?;
    Decimal::try_from_i128_with_scale(i128::from(n), places)
        .map(Value::Decimal)
        .map_err(|e| invalid(type_name, s, e.to_string()))
}

fn to_month_day(raw: &str) -> Result<Value, ConversionError> {
    let s = raw.trim();
    if s.is_empty() || s == "0000" {
        return Ok(Value::Null);
    }
    if s.len() != 4 || !s.is_ascii() {
        return Err(invalid("MONTH_DAY", s, "expected MMDD"));
    }

    let month = digits("MONTH_DAY", s, &s[0..2])?;
    let day = digits("MONTH_DAY", s, &s[2..4])?;
    if !(1..=12).contains(&month) {
        return Err(invalid("MONTH_DAY", s, format!("month {month} out of range")));
    }
    if !(1..=31).contains(&day) {
        return Err(invalid("MONTH_DAY", s, format!("day {day} out of range")));
    }

    Ok(Value::Int(i64::from(month * 100 + day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Value {
        Value::Decimal(Decimal::from_str(s).unwrap())
    }

    // --- registry ---

    #[test]
    fn type_names_are_case_insensitive() {
        assert_eq!(Conversion::from_name("date", None).unwrap(), Conversion::Date);
        assert_eq!(Conversion::from_name("SmallInt", None).unwrap(), Conversion::Int);
        assert_eq!(
            Conversion::from_name("decimal", Some(2)).unwrap(),
            Conversion::Decimal { places: 2 }
        );
    }

    #[test]
    fn unknown_type_names_the_type() {
        let err = convert_value("1", "BLOB", None).unwrap_err();
        assert_eq!(err, ConversionError::UnknownType("BLOB".to_string()));
        assert!(err.to_string().contains("BLOB"));
    }

    // --- date ---

    #[test]
    fn date_parses_valid_values() {
        assert_eq!(
            convert_value("20231115", "DATE", None).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2023, 11, 15).unwrap())
        );
        assert_eq!(
            convert_value("19000101", "DATE", None).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
        );
        assert_eq!(
            convert_value("21001231", "DATE", None).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2100, 12, 31).unwrap())
        );
    }

    #[test]
    fn date_round_trips_across_range() {
        let mut d = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2100, 12, 31).unwrap();
        while d <= end {
            let s = d.format("%Y%m%d").to_string();
            assert_eq!(Conversion::Date.apply(&s).unwrap(), Value::Date(d));
            d += chrono::Duration::days(97);
        }
    }

    #[test]
    fn date_blank_or_zero_is_null() {
        assert_eq!(convert_value("00000000", "DATE", None).unwrap(), Value::Null);
        assert_eq!(convert_value("", "DATE", None).unwrap(), Value::Null);
        assert_eq!(convert_value("        ", "DATE", None).unwrap(), Value::Null);
    }

    #[test]
    fn date_rejects_malformed() {
        for bad in ["20231301", "20230230", "18991231", "2023111", "2023AB15", "20230100"] {
            let err = convert_value(bad, "DATE", None).unwrap_err();
            match err {
                ConversionError::Invalid { value, .. } => assert_eq!(value, bad),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    // --- time ---

    #[test]
    fn time_accepts_hhmm_and_announcement_stamp() {
        assert_eq!(
            convert_value("1530", "TIME", None).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(15, 30, 0).unwrap())
        );
        assert_eq!(
            convert_value("11150945", "TIME", None).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(9, 45, 0).unwrap())
        );
        assert_eq!(
            convert_value("0000", "TIME", None).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(convert_value("  ", "TIME", None).unwrap(), Value::Null);
    }

    #[test]
    fn time_rejects_out_of_range_and_bad_length() {
        assert!(convert_value("2400", "TIME", None).is_err());
        assert!(convert_value("1260", "TIME", None).is_err());
        assert!(convert_value("123", "TIME", None).is_err());
        assert!(convert_value("12:3", "TIME", None).is_err());
    }

    // --- integer ---

    #[test]
    fn int_parses_signed_and_padded() {
        assert_eq!(convert_value("123", "INT", None).unwrap(), Value::Int(123));
        assert_eq!(convert_value("  45  ", "INTEGER", None).unwrap(), Value::Int(45));
        assert_eq!(convert_value("-7", "SMALLINT", None).unwrap(), Value::Int(-7));
        assert_eq!(convert_value("007", "INT", None).unwrap(), Value::Int(7));
    }

    #[test]
    fn int_all_zeros_is_zero_for_any_length() {
        for n in 1..=40 {
            let s = "0".repeat(n);
            assert_eq!(convert_value(&s, "INT", None).unwrap(), Value::Int(0), "len {n}");
        }
    }

    #[test]
    fn int_blank_is_null_and_garbage_errors() {
        assert_eq!(convert_value("", "INT", None).unwrap(), Value::Null);
        assert_eq!(convert_value("   ", "INT", None).unwrap(), Value::Null);
        assert!(convert_value("abc", "INT", None).is_err());
        assert!(convert_value("1 2", "INT", None).is_err());
    }

    // --- decimal family ---

    #[test]
    fn decimal_is_exact() {
        assert_eq!(convert_value("1234", "DECIMAL", Some(1)).unwrap(), dec("123.4"));
        assert_eq!(convert_value("0050", "DECIMAL", Some(1)).unwrap(), dec("5.0"));
        assert_eq!(convert_value("12345", "DECIMAL", Some(2)).unwrap(), dec("123.45"));
        assert_eq!(convert_value("", "DECIMAL", Some(1)).unwrap(), Value::Null);
    }

    #[test]
    fn decimal_defaults_to_one_place() {
        assert_eq!(convert_value("550", "DECIMAL", None).unwrap(), dec("55.0"));
    }

    #[test]
    fn one_place_specializations() {
        assert_eq!(convert_value("1234", "RACE_TIME", None).unwrap(), dec("123.4"));
        assert_eq!(convert_value("0593", "RACE_TIME", None).unwrap(), dec("59.3"));
        assert_eq!(convert_value("115", "LAP_TIME", None).unwrap(), dec("11.5"));
        assert_eq!(convert_value("580", "WEIGHT", None).unwrap(), dec("58.0"));
        assert_eq!(convert_value("9999", "ODDS", None).unwrap(), dec("999.9"));
        assert_eq!(convert_value("0000", "ODDS", None).unwrap(), dec("0.0"));
    }

    #[test]
    fn decimal_rejects_garbage() {
        let err = convert_value("12a4", "RACE_TIME", None).unwrap_err();
        assert!(err.to_string().contains("RACE_TIME"));
    }

    // --- prize money ---

    #[test]
    fn prize_money_is_unscaled_thousands() {
        assert_eq!(convert_value("00050000", "PRIZE_MONEY", None).unwrap(), Value::Int(50_000));
        assert_eq!(convert_value("00000100", "PRIZE_MONEY", None).unwrap(), Value::Int(100));
    }

    // --- month-day ---

    #[test]
    fn month_day_drops_leading_zero_in_value() {
        assert_eq!(convert_value("0101", "MONTH_DAY", None).unwrap(), Value::Int(101));
        assert_eq!(convert_value("1115", "MONTH_DAY", None).unwrap(), Value::Int(1115));
        assert_eq!(convert_value("1231", "MONTH_DAY", None).unwrap(), Value::Int(1231));
    }

    #[test]
    fn month_day_blank_or_zero_is_null() {
        assert_eq!(convert_value("0000", "MONTH_DAY", None).unwrap(), Value::Null);
        assert_eq!(convert_value("    ", "MONTH_DAY", None).unwrap(), Value::Null);
    }

    #[test]
    fn month_day_rejects_malformed() {
        assert!(convert_value("1301", "MONTH_DAY", None).is_err());
        assert!(convert_value("0132", "MONTH_DAY", None).is_err());
        assert!(convert_value("101", "MONTH_DAY", None).is_err());
    }
}
