use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DateError {
    #[error("Could not parse date {0:?} as {1}")]
    Unparseable(String, DateFormat),
    #[error("Unknown date format {0:?}, expected YMD, DMY or MDY")]
    UnknownFormat(String),
}

/// Field order of user-supplied dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[default]
    Ymd,
    Dmy,
    Mdy,
}

impl Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateFormat::Ymd => write!(f, "YMD"),
            DateFormat::Dmy => write!(f, "DMY"),
            DateFormat::Mdy => write!(f, "MDY"),
        }
    }
}

impl FromStr for DateFormat {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YMD" => Ok(DateFormat::Ymd),
            "DMY" => Ok(DateFormat::Dmy),
            "MDY" => Ok(DateFormat::Mdy),
            _ => Err(DateError::UnknownFormat(s.into())),
        }
    }
}

/// Milliseconds since the epoch for the current instant.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses `input` into milliseconds since the epoch.
///
/// Accepts `now`, RFC 3339 timestamps, and dates in `format` order separated
/// by `/`, `-` or `.`, optionally followed by `HH:MM[:SS]` after a space or
/// `T`. Anything without an explicit offset is taken as UTC.
pub fn to_millis(input: &str, format: DateFormat) -> Result<i64, DateError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("now") {
        return Ok(now_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp_millis());
    }

    let unparseable = || DateError::Unparseable(input.into(), format);

    let (date_part, time_part) = match input.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (input, None),
    };

    let fields: Vec<&str> = date_part.split(['/', '-', '.']).collect();
    let [a, b, c] = fields.as_slice() else {
        return Err(unparseable());
    };
    let (year, month, day) = match format {
        DateFormat::Ymd => (a, b, c),
        DateFormat::Dmy => (c, b, a),
        DateFormat::Mdy => (c, a, b),
    };
    let year: i32 = year.parse().map_err(|_| unparseable())?;
    let month: u32 = month.parse().map_err(|_| unparseable())?;
    let day: u32 = day.parse().map_err(|_| unparseable())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(unparseable)?;

    let time = match time_part {
        None => NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(unparseable)?,
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .map_err(|_| unparseable())?,
    };

    Ok(NaiveDateTime::new(date, time).and_utc().timestamp_millis())
}

/// Renders a millisecond timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("invalid timestamp {}", ms))
}

/// Stamp used in default output file names, in local time.
pub fn file_stamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2016-01-01T00:00:00Z
    const JAN_1_2016: i64 = 1_451_606_400_000;
    // 2016-03-02T00:00:00Z
    const MAR_2_2016: i64 = 1_456_876_800_000;

    #[test]
    fn parses_each_field_order() {
        assert_eq!(to_millis("2016/03/02", DateFormat::Ymd), Ok(MAR_2_2016));
        assert_eq!(to_millis("02/03/2016", DateFormat::Dmy), Ok(MAR_2_2016));
        assert_eq!(to_millis("03/02/2016", DateFormat::Mdy), Ok(MAR_2_2016));
    }

    #[test]
    fn accepts_other_separators_and_times() {
        assert_eq!(to_millis("2016-01-01", DateFormat::Ymd), Ok(JAN_1_2016));
        assert_eq!(to_millis("2016.1.1", DateFormat::Ymd), Ok(JAN_1_2016));
        assert_eq!(
            to_millis("2016-01-01 00:05", DateFormat::Ymd),
            Ok(JAN_1_2016 + 5 * 60_000)
        );
        assert_eq!(
            to_millis("2016-01-01T01:00:30", DateFormat::Ymd),
            Ok(JAN_1_2016 + 3_600_000 + 30_000)
        );
    }

    #[test]
    fn accepts_rfc3339_with_offset() {
        assert_eq!(
            to_millis("2016-01-01T02:00:00+02:00", DateFormat::Dmy),
            Ok(JAN_1_2016)
        );
        assert_eq!(to_millis("2016-01-01T00:05:00Z", DateFormat::Ymd), Ok(JAN_1_2016 + 300_000));
    }

    #[test]
    fn now_is_close_to_the_clock() {
        let before = now_millis();
        let parsed = to_millis("now", DateFormat::Ymd).unwrap();
        assert!(parsed >= before && parsed - before < 60_000);
    }

    #[test]
    fn rejects_malformed_dates() {
        for bad in ["", "2016", "2016/13/01", "2016/02/30", "yesterday", "2016/01/01 25:00"] {
            assert!(
                matches!(to_millis(bad, DateFormat::Ymd), Err(DateError::Unparseable(..))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn date_format_names() {
        assert_eq!("dmy".parse::<DateFormat>(), Ok(DateFormat::Dmy));
        assert_eq!("MDY".parse::<DateFormat>(), Ok(DateFormat::Mdy));
        assert!("DYM".parse::<DateFormat>().is_err());
        assert_eq!(DateFormat::default(), DateFormat::Ymd);
    }

    #[test]
    fn formats_timestamps() {
        assert_eq!(format_millis(JAN_1_2016 + 59_999), "2016-01-01 00:00:59");
        let local = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(file_stamp(local), "2024-05-06_070809");
    }
}
