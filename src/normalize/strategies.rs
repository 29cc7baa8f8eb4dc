//! Field extraction strategies.
//!
//! Stored documents drift in shape over time, so each derived field has an
//! ordered list of strategies. Each strategy looks in one place and returns
//! `None` when the field is not there or not usable; the first `Some` wins.

use crate::source::document::RawDocument;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde_json::Value;

pub type Strategy<T> = fn(&RawDocument) -> Option<T>;

/// Runs `strategies` in order and returns the first value found.
pub fn first_success<T>(document: &RawDocument, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(document))
}

pub const TIMESTAMP_STRATEGIES: &[Strategy<NaiveDateTime>] = &[
    timestamp_from_ts,
    timestamp_from_date_string,
    timestamp_from_number_long,
    timestamp_from_date_millis,
];

/// `ts` holding a datetime string.
fn timestamp_from_ts(document: &RawDocument) -> Option<NaiveDateTime> {
    document.get("ts")?.as_str().and_then(parse_datetime_str)
}

/// `ts.$date` holding a datetime string (relaxed Extended JSON).
fn timestamp_from_date_string(document: &RawDocument) -> Option<NaiveDateTime> {
    document.get("ts.$date")?.as_str().and_then(parse_datetime_str)
}

/// `ts.$date.$numberLong` holding epoch milliseconds (canonical Extended JSON).
fn timestamp_from_number_long(document: &RawDocument) -> Option<NaiveDateTime> {
    let value = document.get("ts.$date.$numberLong")?;
    let millis = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    from_epoch_millis(millis)
}

/// `ts.$date` holding epoch milliseconds as a plain integer.
fn timestamp_from_date_millis(document: &RawDocument) -> Option<NaiveDateTime> {
    document.get("ts.$date")?.as_i64().and_then(from_epoch_millis)
}

pub fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a datetime string into naive UTC at millisecond precision.
///
/// Strings with an offset are converted to UTC; strings without one are taken
/// as UTC already. A bare date means midnight.
///
/// # Examples
///
/// ```
/// use weather_dashboard::parse_datetime_str;
///
/// let a = parse_datetime_str("2023-06-01T12:30:00+02:00").unwrap();
/// let b = parse_datetime_str("2023-06-01 10:30:00").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_datetime_str("yesterday").is_none());
/// ```
pub fn parse_datetime_str(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc().trunc_subsecs(3));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_utc().trunc_subsecs(3));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map(|dt| dt.trunc_subsecs(3))
}

/// `position.coordinates` as `[longitude, latitude]`, returned as `(latitude, longitude)`.
///
/// The list must hold exactly two finite numbers. Their values are not range checked.
pub fn coordinates(document: &RawDocument) -> Option<(f64, f64)> {
    let pair = document.get("position.coordinates")?.as_array()?;
    let [longitude, latitude] = pair.as_slice() else {
        return None;
    };
    Some((coerce_f64(latitude)?, coerce_f64(longitude)?))
}

const EXTENDED_JSON_NUMBERS: [&str; 4] =
    ["$numberDouble", "$numberInt", "$numberLong", "$numberDecimal"];

/// Coerces a JSON value to a finite `f64`.
///
/// Numbers, numeric strings and Extended JSON number wrappers are accepted.
/// Everything else, including `NaN` and infinities, yields `None`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(fields) if fields.len() == 1 => EXTENDED_JSON_NUMBERS
            .iter()
            .find_map(|key| fields.get(*key))
            .filter(|inner| !inner.is_object())
            .and_then(coerce_f64),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> RawDocument {
        RawDocument::try_from(value).unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_timestamp_direct_string() {
        let d = doc(json!({"ts": "2023-10-26T14:00:00Z"}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(2023, 10, 26, 14, 0, 0))
        );
    }

    #[test]
    fn test_timestamp_number_long() {
        // 2023-11-14T22:13:20Z
        let d = doc(json!({"ts": {"$date": {"$numberLong": "1700000000000"}}}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(2023, 11, 14, 22, 13, 20))
        );
        let d = doc(json!({"ts": {"$date": {"$numberLong": 1700000000000i64}}}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(2023, 11, 14, 22, 13, 20))
        );
    }

    #[test]
    fn test_timestamp_extended_json_variants() {
        let d = doc(json!({"ts": {"$date": "1984-03-05T13:00:00.000Z"}}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(1984, 3, 5, 13, 0, 0))
        );
        let d = doc(json!({"ts": {"$date": 0}}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(1970, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_timestamp_direct_wins_over_nested() {
        // A direct string is preferred even when a nested form is also present.
        let d = doc(json!({"ts": "2020-01-01T00:00:00Z", "other": {"$date": 0}}));
        assert_eq!(
            first_success(&d, TIMESTAMP_STRATEGIES),
            Some(dt(2020, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_timestamp_unusable() {
        for value in [
            json!({}),
            json!({"ts": "not a date"}),
            json!({"ts": true}),
            json!({"ts": {"$date": {"$numberLong": "abc"}}}),
            json!({"ts": {"$date": null}}),
        ] {
            assert_eq!(first_success(&doc(value.clone()), TIMESTAMP_STRATEGIES), None, "{value}");
        }
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(
            parse_datetime_str("2023-01-02 03:04:05"),
            Some(dt(2023, 1, 2, 3, 4, 5))
        );
        assert_eq!(
            parse_datetime_str(" 2023-01-02T03:04 "),
            Some(dt(2023, 1, 2, 3, 4, 0))
        );
        assert_eq!(
            parse_datetime_str("2023-01-02"),
            Some(dt(2023, 1, 2, 0, 0, 0))
        );
        assert_eq!(
            parse_datetime_str("2023-01-02T03:04:05+0100"),
            Some(dt(2023, 1, 2, 2, 4, 5))
        );
    }

    #[test]
    fn test_parse_datetime_truncates_to_millis() {
        let parsed = parse_datetime_str("2023-01-02T03:04:05.123456789Z").unwrap();
        let expected = dt(2023, 1, 2, 3, 4, 5)
            .checked_add_signed(chrono::Duration::milliseconds(123))
            .unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_coordinates_lon_lat_order() {
        let d = doc(json!({"position": {"type": "Point", "coordinates": [-47.9, 47.6]}}));
        assert_eq!(coordinates(&d), Some((47.6, -47.9)));
    }

    #[test]
    fn test_coordinates_malformed() {
        for value in [
            json!({}),
            json!({"position": {}}),
            json!({"position": {"coordinates": "1,2"}}),
            json!({"position": {"coordinates": [1.0]}}),
            json!({"position": {"coordinates": [1.0, 2.0, 3.0]}}),
            json!({"position": {"coordinates": [1.0, "north"]}}),
            json!({"position": {"coordinates": [1.0, null]}}),
            json!({"position": {"coordinates": [{"$numberDouble": "NaN"}, 2.0]}}),
        ] {
            assert_eq!(coordinates(&doc(value.clone())), None, "{value}");
        }
    }

    #[test]
    fn test_coordinates_out_of_range_are_kept() {
        let d = doc(json!({"position": {"coordinates": [10.0, 95.0]}}));
        assert_eq!(coordinates(&d), Some((95.0, 10.0)));
        let d = doc(json!({"position": {"coordinates": [200.0, 10.0]}}));
        assert_eq!(coordinates(&d), Some((10.0, 200.0)));
    }

    #[test]
    fn test_coerce_f64() {
        assert_eq!(coerce_f64(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_f64(&json!(-3)), Some(-3.0));
        assert_eq!(coerce_f64(&json!(" 7.25 ")), Some(7.25));
        assert_eq!(coerce_f64(&json!("1e3")), Some(1000.0));
        assert_eq!(coerce_f64(&json!({"$numberDouble": "21.5"})), Some(21.5));
        assert_eq!(coerce_f64(&json!({"$numberInt": 4})), Some(4.0));
        assert_eq!(coerce_f64(&json!("bad")), None);
        assert_eq!(coerce_f64(&json!("")), None);
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!("inf")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
        assert_eq!(coerce_f64(&json!(true)), None);
        assert_eq!(coerce_f64(&json!([1.0])), None);
        assert_eq!(coerce_f64(&json!({"value": 1.0})), None);
        assert_eq!(coerce_f64(&json!({"$numberDouble": {"$numberDouble": "1"}})), None);
    }
}
