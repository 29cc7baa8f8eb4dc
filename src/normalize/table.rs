//! The normalized observations as a Polars frame.

use crate::normalize::row::{
    ObservationRow, DATE, DEWPOINT, HOUR, LATITUDE, LOCATION, LONGITUDE, PRESSURE, TEMPERATURE,
    TIMESTAMP, UNKNOWN_LOCATION, WIND_SPEED,
};
use crate::normalize::strategies::from_epoch_millis;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeSet;

/// A wrapper around the normalized observation `DataFrame`.
///
/// Columns, in order: `timestamp` (naive UTC, milliseconds), `date`, `hour`,
/// `latitude`, `longitude`, `location`, `temperature`, `dewpoint`,
/// `wind_speed`, `pressure`. Every column but `location` is nullable.
///
/// Cloning is cheap; the column buffers are shared.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    frame: DataFrame,
}

impl ObservationTable {
    /// Builds the table from normalized rows, one table row per observation.
    pub fn from_rows(rows: &[ObservationRow]) -> PolarsResult<Self> {
        let millis: Vec<Option<i64>> = rows
            .iter()
            .map(|r| r.timestamp.map(|t| t.and_utc().timestamp_millis()))
            .collect();
        let hours: Vec<Option<i32>> = rows.iter().map(|r| r.hour.map(|h| h as i32)).collect();
        let locations: Vec<String> = rows.iter().map(|r| r.location.clone()).collect();

        let frame = df!(
            TIMESTAMP => millis,
            HOUR => hours,
            LATITUDE => rows.iter().map(|r| r.latitude).collect::<Vec<_>>(),
            LONGITUDE => rows.iter().map(|r| r.longitude).collect::<Vec<_>>(),
            LOCATION => locations,
            TEMPERATURE => rows.iter().map(|r| r.temperature).collect::<Vec<_>>(),
            DEWPOINT => rows.iter().map(|r| r.dewpoint).collect::<Vec<_>>(),
            WIND_SPEED => rows.iter().map(|r| r.wind_speed).collect::<Vec<_>>(),
            PRESSURE => rows.iter().map(|r| r.pressure).collect::<Vec<_>>(),
        )?
        .lazy()
        .with_column(col(TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
        .with_column(col(TIMESTAMP).dt().date().alias(DATE))
        .select([
            col(TIMESTAMP),
            col(DATE),
            col(HOUR),
            col(LATITUDE),
            col(LONGITUDE),
            col(LOCATION),
            col(TEMPERATURE),
            col(DEWPOINT),
            col(WIND_SPEED),
            col(PRESSURE),
        ])
        .collect()?;

        Ok(Self { frame })
    }

    /// Wraps a frame that already has the observation schema, such as a filtered subset.
    pub fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Distinct location keys, sorted.
    pub fn locations(&self) -> PolarsResult<Vec<String>> {
        let locations: BTreeSet<String> = self
            .frame
            .column(LOCATION)?
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(locations.into_iter().collect())
    }

    /// Earliest and latest non-null timestamp, or `None` when no row has one.
    pub fn timestamp_span(&self) -> PolarsResult<Option<(NaiveDateTime, NaiveDateTime)>> {
        let timestamps = timestamps(&self.frame)?;
        let mut present = timestamps.into_iter().flatten();
        let Some(first) = present.next() else {
            return Ok(None);
        };
        let (min, max) = present.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Ok(Some((min, max)))
    }

    /// Earliest and latest observation date.
    pub fn date_span(&self) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
        Ok(self
            .timestamp_span()?
            .map(|(start, end)| (start.date(), end.date())))
    }

    /// The first `limit` rows, materialized.
    pub fn head_rows(&self, limit: usize) -> PolarsResult<Vec<ObservationRow>> {
        collect_rows(&self.frame.head(Some(limit)))
    }

    pub fn rows(&self) -> PolarsResult<Vec<ObservationRow>> {
        collect_rows(&self.frame)
    }
}

/// Reads the `timestamp` column back into naive datetimes.
pub(crate) fn timestamps(frame: &DataFrame) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let millis = frame.column(TIMESTAMP)?.cast(&DataType::Int64)?;
    Ok(millis
        .i64()?
        .into_iter()
        .map(|ms| ms.and_then(from_epoch_millis))
        .collect())
}

/// Materializes a frame with the observation schema into rows.
pub fn collect_rows(frame: &DataFrame) -> PolarsResult<Vec<ObservationRow>> {
    let timestamps = timestamps(frame)?;
    let latitude = frame.column(LATITUDE)?.f64()?;
    let longitude = frame.column(LONGITUDE)?.f64()?;
    let location = frame.column(LOCATION)?.str()?;
    let temperature = frame.column(TEMPERATURE)?.f64()?;
    let dewpoint = frame.column(DEWPOINT)?.f64()?;
    let wind_speed = frame.column(WIND_SPEED)?.f64()?;
    let pressure = frame.column(PRESSURE)?.f64()?;

    Ok(timestamps
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let mut row = ObservationRow::at(timestamp);
            row.latitude = latitude.get(i);
            row.longitude = longitude.get(i);
            row.location = location.get(i).unwrap_or(UNKNOWN_LOCATION).to_string();
            row.temperature = temperature.get(i);
            row.dewpoint = dewpoint.get(i);
            row.wind_speed = wind_speed.get(i);
            row.pressure = pressure.get(i);
            row
        })
        .collect())
}
