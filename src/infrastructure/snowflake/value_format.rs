// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rendering of Snowflake JSON result cells into their CSV text form.
//!
//! Snowflake sends every cell of a JSON result set as a string. Most are
//! already in the form we want (numbers, text, hex binaries, semi-structured
//! JSON). Temporal types and booleans arrive in wire encodings and are
//! converted here:
//!
//! | type            | wire                      | CSV                                   |
//! |-----------------|---------------------------|---------------------------------------|
//! | `boolean`       | `1` / `0`                 | `true` / `false`                      |
//! | `date`          | days since epoch          | `YYYY-MM-DD`                          |
//! | `time`          | `secs.fraction`           | `HH:MM:SS[.f]`                        |
//! | `timestamp_ntz` | `secs.fraction`           | `YYYY-MM-DD HH:MM:SS[.f]`             |
//! | `timestamp_ltz` | `secs.fraction`           | `YYYY-MM-DD HH:MM:SS[.f]` (UTC)       |
//! | `timestamp_tz`  | `secs.fraction offset`    | `YYYY-MM-DD HH:MM:SS[.f]+HH:MM`       |
//!
//! `[.f]` has as many digits as the column scale and is left out at scale 0.

use crate::domain::entities::ColumnMetadata;
use crate::domain::errors::{ExportError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike};

const NANOS_PER_SEC: i128 = 1_000_000_000;
/// `timestamp_tz` offsets are sent as minutes shifted by one day.
const TZ_OFFSET_BIAS_MINUTES: i32 = 1440;

/// Renders one non-null cell of `column`.
pub fn format_value(raw: &str, column: &ColumnMetadata) -> Result<String> {
    let scale = column.scale.unwrap_or(9).clamp(0, 9) as usize;
    let bad = || {
        ExportError::ProtocolError(format!(
            "cannot decode {} value {:?} in column {}",
            column.raw_type, raw, column.name
        ))
    };

    match column.raw_type.as_str() {
        "boolean" => match raw {
            "1" | "true" | "TRUE" => Ok("true".to_string()),
            "0" | "false" | "FALSE" => Ok("false".to_string()),
            _ => Err(bad()),
        },
        "date" => {
            let days: i64 = raw.parse().map_err(|_| bad())?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(bad)?;
            let date = epoch
                .checked_add_signed(Duration::try_days(days).ok_or_else(bad)?)
                .ok_or_else(bad)?;
            Ok(date.format("%Y-%m-%d").to_string())
        }
        "time" => {
            let nanos = parse_epoch_nanos(raw).ok_or_else(bad)?;
            let secs = u32::try_from(nanos.div_euclid(NANOS_PER_SEC)).map_err(|_| bad())?;
            let frac = nanos.rem_euclid(NANOS_PER_SEC) as u32;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, frac).ok_or_else(bad)?;
            Ok(format!("{}{}", time.format("%H:%M:%S"), fraction(time.nanosecond(), scale)))
        }
        "timestamp_ntz" | "timestamp_ltz" => {
            let dt = utc_from_epoch(parse_epoch_nanos(raw).ok_or_else(bad)?).ok_or_else(bad)?;
            Ok(format!(
                "{}{}",
                dt.format("%Y-%m-%d %H:%M:%S"),
                fraction(dt.nanosecond(), scale)
            ))
        }
        "timestamp_tz" => {
            let (epoch, offset) = raw.split_once(' ').ok_or_else(bad)?;
            let offset_minutes: i32 = offset.trim().parse().map_err(|_| bad())?;
            let tz = FixedOffset::east_opt((offset_minutes - TZ_OFFSET_BIAS_MINUTES) * 60)
                .ok_or_else(bad)?;
            let dt = utc_from_epoch(parse_epoch_nanos(epoch).ok_or_else(bad)?)
                .ok_or_else(bad)?
                .with_timezone(&tz);
            Ok(format!(
                "{}{}{}",
                dt.format("%Y-%m-%d %H:%M:%S"),
                fraction(dt.nanosecond(), scale),
                dt.format("%:z")
            ))
        }
        _ => Ok(raw.to_string()),
    }
}

/// Parses `[-]secs[.fraction]` into signed nanoseconds.
fn parse_epoch_nanos(raw: &str) -> Option<i128> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (secs, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if secs.is_empty() || frac.len() > 9 || !all_digits(secs) || !all_digits(frac) {
        return None;
    }
    let secs: i128 = secs.parse().ok()?;
    let frac_nanos: i128 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac).parse().ok()?
    };
    let total = secs.checked_mul(NANOS_PER_SEC)?.checked_add(frac_nanos)?;
    Some(if negative { -total } else { total })
}

fn utc_from_epoch(nanos: i128) -> Option<DateTime<chrono::Utc>> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let sub = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, sub)
}

fn fraction(nanos: u32, scale: usize) -> String {
    if scale == 0 {
        return String::new();
    }
    let digits = format!("{:09}", nanos);
    format!(".{}", &digits[..scale])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(raw_type: &str, scale: Option<i64>) -> ColumnMetadata {
        ColumnMetadata {
            name: "C".to_string(),
            raw_type: raw_type.to_string(),
            scale,
        }
    }

    #[test]
    fn test_passthrough_types() {
        assert_eq!(format_value("1.50", &column("fixed", Some(2))).unwrap(), "1.50");
        assert_eq!(format_value("2.5e10", &column("real", None)).unwrap(), "2.5e10");
        assert_eq!(
            format_value("hello, world", &column("text", None)).unwrap(),
            "hello, world"
        );
        assert_eq!(
            format_value("{\n  \"a\": 1\n}", &column("variant", None)).unwrap(),
            "{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn test_boolean() {
        assert_eq!(format_value("1", &column("boolean", None)).unwrap(), "true");
        assert_eq!(format_value("0", &column("boolean", None)).unwrap(), "false");
        assert!(format_value("yes", &column("boolean", None)).is_err());
    }

    #[test]
    fn test_date() {
        assert_eq!(format_value("0", &column("date", None)).unwrap(), "1970-01-01");
        assert_eq!(format_value("19797", &column("date", None)).unwrap(), "2024-03-15");
        assert_eq!(format_value("-1", &column("date", None)).unwrap(), "1969-12-31");
    }

    #[test]
    fn test_time_respects_scale() {
        assert_eq!(format_value("3723.5", &column("time", Some(3))).unwrap(), "01:02:03.500");
        assert_eq!(format_value("3723.000000000", &column("time", Some(0))).unwrap(), "01:02:03");
    }

    #[test]
    fn test_timestamp_ntz() {
        let col = column("timestamp_ntz", Some(6));
        assert_eq!(
            format_value("1710495000.123456000", &col).unwrap(),
            "2024-03-15 09:30:00.123456"
        );
        assert_eq!(
            format_value("-0.500000000", &col).unwrap(),
            "1969-12-31 23:59:59.500000"
        );
        assert_eq!(
            format_value("1710495000", &column("timestamp_ltz", Some(0))).unwrap(),
            "2024-03-15 09:30:00"
        );
    }

    #[test]
    fn test_timestamp_tz_applies_offset() {
        // 1500 - 1440 = +60 minutes
        let col = column("timestamp_tz", Some(3));
        assert_eq!(
            format_value("1710495000.250000000 1500", &col).unwrap(),
            "2024-03-15 10:30:00.250+01:00"
        );
        assert_eq!(
            format_value("1710495000.000000000 1140", &column("timestamp_tz", Some(0))).unwrap(),
            "2024-03-15 04:30:00-05:00"
        );
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert!(format_value("abc", &column("date", None)).is_err());
        assert!(format_value("12.3.4", &column("timestamp_ntz", Some(9))).is_err());
        assert!(format_value("1710495000", &column("timestamp_tz", Some(0))).is_err());

        let huge = "9".repeat(35);
        assert!(format_value(&huge, &column("timestamp_ntz", Some(0))).is_err());
        assert!(format_value("--5", &column("time", Some(0))).is_err());
    }
}
