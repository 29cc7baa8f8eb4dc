use crate::normalize::strategies::parse_datetime_str;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeZone};
use std::fmt;

/// One end of a user-selected time interval.
///
/// A whole day widens to its first or last millisecond depending on which
/// side of the interval it is used for. Zoned datetimes are converted to UTC
/// when the bound is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateBound {
    Day(NaiveDate),
    At(NaiveDateTime),
}

impl DateBound {
    /// Resolves the bound as an interval start.
    pub fn lower(&self) -> NaiveDateTime {
        match self {
            DateBound::Day(date) => date.and_time(NaiveTime::MIN),
            DateBound::At(dt) => dt.trunc_subsecs(3),
        }
    }

    /// Resolves the bound as an interval end (inclusive).
    pub fn upper(&self) -> NaiveDateTime {
        match self {
            DateBound::Day(date) => date
                .and_hms_milli_opt(23, 59, 59, 999)
                .unwrap_or_else(|| date.and_time(NaiveTime::MIN)),
            DateBound::At(dt) => dt.trunc_subsecs(3),
        }
    }

    /// Parses `YYYY-MM-DD` as a whole day, anything else as a datetime.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(DateBound::Day(date));
        }
        parse_datetime_str(text).map(DateBound::At)
    }
}

impl From<NaiveDate> for DateBound {
    fn from(value: NaiveDate) -> Self {
        DateBound::Day(value)
    }
}

impl From<NaiveDateTime> for DateBound {
    fn from(value: NaiveDateTime) -> Self {
        DateBound::At(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for DateBound {
    fn from(value: DateTime<Tz>) -> Self {
        DateBound::At(value.naive_utc())
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Day(date) => write!(f, "{}", date),
            DateBound::At(dt) => write!(f, "{}", dt),
        }
    }
}
