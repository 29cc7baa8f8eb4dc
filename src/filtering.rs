use crate::normalize::row::{LOCATION, TIMESTAMP};
use crate::normalize::table::ObservationTable;
use crate::types::date_bound::DateBound;
use bon::bon;
use chrono::NaiveDateTime;
use polars::prelude::{col, lit, DataType, LazyFrame, NamedFrom, PolarsResult, Series, TimeUnit};
use std::collections::BTreeSet;

/// A closed interval of naive UTC timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Which rows survive filtering: the location must be selected and the
/// timestamp must lie inside the interval.
///
/// A missing interval means the table offered no timestamps to default to;
/// such criteria match nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub locations: BTreeSet<String>,
    pub interval: Option<TimeInterval>,
}

#[bon]
impl FilterCriteria {
    /// Resolves user selections against a table.
    ///
    /// # Arguments
    ///
    /// * `for_table(&ObservationTable)`: **Required.** The table whose observed values supply defaults.
    /// * `.locations(Vec<String>)`: Optional. Selected location keys. Defaults to every observed location.
    /// * `.start(impl Into<DateBound>)`: Optional. Interval start. A date means its first millisecond.
    ///   Defaults to the earliest observed timestamp.
    /// * `.end(impl Into<DateBound>)`: Optional. Inclusive interval end. A date means its last millisecond.
    ///   Defaults to the latest observed timestamp.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use weather_dashboard::{FilterCriteria, ObservationTable};
    /// # use chrono::NaiveDate;
    /// # fn run(table: &ObservationTable) -> polars::prelude::PolarsResult<()> {
    /// let criteria = FilterCriteria::for_table(table)
    ///     .locations(vec!["52.1,5.18".to_string()])
    ///     .start(NaiveDate::from_ymd_opt(2023, 10, 1).unwrap())
    ///     .build()?;
    /// let filtered = criteria.apply(table)?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = for_table, finish_fn = build)]
    pub fn new(
        #[builder(start_fn)] table: &ObservationTable,
        locations: Option<Vec<String>>,
        #[builder(into)] start: Option<DateBound>,
        #[builder(into)] end: Option<DateBound>,
    ) -> PolarsResult<Self> {
        let locations = match locations {
            Some(selected) => selected.into_iter().collect(),
            None => table.locations()?.into_iter().collect(),
        };

        let observed = table.timestamp_span()?;
        let start = start
            .map(|bound| bound.lower())
            .or(observed.map(|(min, _)| min));
        let end = end.map(|bound| bound.upper()).or(observed.map(|(_, max)| max));
        let interval = match (start, end) {
            (Some(start), Some(end)) => Some(TimeInterval { start, end }),
            _ => None,
        };

        Ok(Self {
            locations,
            interval,
        })
    }
}

impl FilterCriteria {
    /// Criteria selecting everything the table has to offer.
    pub fn wide_open(table: &ObservationTable) -> PolarsResult<Self> {
        Self::for_table(table).build()
    }

    /// Returns the rows of `table` matching these criteria, in their original order.
    pub fn apply(&self, table: &ObservationTable) -> PolarsResult<ObservationTable> {
        let frame = table.lazy().filter_criteria(self).collect()?;
        Ok(ObservationTable::from_frame(frame))
    }
}

pub trait ObservationFrameFilterExt {
    /// Keeps rows whose `location` is one of `locations`.
    fn filter_locations(self, locations: &BTreeSet<String>) -> LazyFrame;

    /// Keeps rows whose `timestamp` is within the interval (inclusive).
    /// Rows with a null timestamp never match. With no interval, nothing matches.
    fn filter_interval(self, interval: Option<&TimeInterval>) -> LazyFrame;

    fn filter_criteria(self, criteria: &FilterCriteria) -> LazyFrame;
}

impl ObservationFrameFilterExt for LazyFrame {
    fn filter_locations(self, locations: &BTreeSet<String>) -> LazyFrame {
        let selected = Series::new(
            LOCATION.into(),
            locations.iter().cloned().collect::<Vec<String>>(),
        );
        self.filter(col(LOCATION).is_in(lit(selected)))
    }

    fn filter_interval(self, interval: Option<&TimeInterval>) -> LazyFrame {
        let Some(interval) = interval else {
            return self.limit(0);
        };
        let timestamp = || col(TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None));
        self.filter(
            timestamp()
                .gt_eq(lit(interval.start))
                .and(timestamp().lt_eq(lit(interval.end))),
        )
    }

    fn filter_criteria(self, criteria: &FilterCriteria) -> LazyFrame {
        self.filter_locations(&criteria.locations)
            .filter_interval(criteria.interval.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::row::{Measurement, ObservationRow};
    use chrono::{NaiveDate, NaiveTime};

    fn at(day: u32, time: NaiveTime) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 10, day).unwrap().and_time(time)
    }

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn table() -> ObservationTable {
        let rows = vec![
            ObservationRow::at(Some(at(1, hms(6, 0, 0)))).with_position(52.1, 5.18),
            ObservationRow::at(Some(at(1, hms(12, 0, 0)))).with_position(48.85, 2.35),
            ObservationRow::at(Some(at(2, NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap())))
                .with_position(52.1, 5.18),
            ObservationRow::at(Some(at(3, hms(0, 0, 0)))).with_position(52.1, 5.18),
            ObservationRow::at(None)
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(30.0)),
        ];
        ObservationTable::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_wide_open_drops_only_null_timestamps() -> PolarsResult<()> {
        let table = table();
        let criteria = FilterCriteria::wide_open(&table)?;
        assert_eq!(
            criteria.interval,
            Some(TimeInterval {
                start: at(1, hms(6, 0, 0)),
                end: at(3, hms(0, 0, 0)),
            })
        );
        let filtered = criteria.apply(&table)?;
        let expected: Vec<ObservationRow> = table
            .rows()?
            .into_iter()
            .filter(|r| r.timestamp.is_some())
            .collect();
        assert_eq!(filtered.rows()?, expected);
        Ok(())
    }

    #[test]
    fn test_filter_is_idempotent() -> PolarsResult<()> {
        let table = table();
        let criteria = FilterCriteria::for_table(&table)
            .locations(vec!["52.1,5.18".to_string()])
            .start(NaiveDate::from_ymd_opt(2023, 10, 1).unwrap())
            .end(NaiveDate::from_ymd_opt(2023, 10, 2).unwrap())
            .build()?;
        let once = criteria.apply(&table)?;
        let twice = criteria.apply(&once)?;
        assert_eq!(once.height(), 2);
        assert!(once.frame().equals_missing(twice.frame()));
        Ok(())
    }

    #[test]
    fn test_date_bounds_are_inclusive_whole_days() -> PolarsResult<()> {
        let table = table();
        let criteria = FilterCriteria::for_table(&table)
            .start(NaiveDate::from_ymd_opt(2023, 10, 2).unwrap())
            .end(NaiveDate::from_ymd_opt(2023, 10, 2).unwrap())
            .build()?;
        let rows = criteria.apply(&table)?.rows()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].timestamp,
            Some(at(2, NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()))
        );
        Ok(())
    }

    #[test]
    fn test_datetime_bound_is_exact() -> PolarsResult<()> {
        let table = table();
        let criteria = FilterCriteria::for_table(&table)
            .start(at(1, hms(12, 0, 0)))
            .build()?;
        assert_eq!(criteria.apply(&table)?.height(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_selection_matches_nothing() -> PolarsResult<()> {
        let table = table();
        let criteria = FilterCriteria::for_table(&table)
            .locations(Vec::new())
            .build()?;
        assert!(criteria.apply(&table)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_no_timestamps_match_nothing() -> PolarsResult<()> {
        let table = ObservationTable::from_rows(&[ObservationRow::at(None)])?;
        let criteria = FilterCriteria::wide_open(&table)?;
        assert_eq!(criteria.interval, None);
        let filtered = criteria.apply(&table)?;
        assert!(filtered.is_empty());
        assert_eq!(filtered.frame().width(), table.frame().width());
        Ok(())
    }

    #[test]
    fn test_interval_contains() {
        let interval = TimeInterval {
            start: at(1, hms(0, 0, 0)),
            end: at(1, hms(1, 0, 0)),
        };
        assert!(interval.contains(at(1, hms(0, 0, 0))));
        assert!(interval.contains(at(1, hms(1, 0, 0))));
        assert!(!interval.contains(at(1, hms(1, 0, 1))));
    }
}
