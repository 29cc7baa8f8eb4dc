//! Summary statistics over a filtered observation table.

use crate::error::DashboardError;
use crate::normalize::row::{Measurement, HOUR, LOCATION, TEMPERATURE, TIMESTAMP};
use crate::normalize::table::ObservationTable;
use log::debug;
use polars::prelude::*;
use serde::Serialize;

/// Per-measurement means. `None` when every value was null.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MeasurementMeans {
    pub temperature: Option<f64>,
    pub dewpoint: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
}

impl MeasurementMeans {
    pub fn get(&self, measurement: Measurement) -> Option<f64> {
        match measurement {
            Measurement::Temperature => self.temperature,
            Measurement::Dewpoint => self.dewpoint,
            Measurement::WindSpeed => self.wind_speed,
            Measurement::Pressure => self.pressure,
        }
    }

    fn set(&mut self, measurement: Measurement, value: Option<f64>) {
        match measurement {
            Measurement::Temperature => self.temperature = value,
            Measurement::Dewpoint => self.dewpoint = value,
            Measurement::WindSpeed => self.wind_speed = value,
            Measurement::Pressure => self.pressure = value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub means: MeasurementMeans,
    /// Columns `hour`, `location`, `temperature` (mean), sorted by location then hour.
    pub hourly_profile: DataFrame,
    /// The filtered rows sorted by location then timestamp.
    pub trend: DataFrame,
}

/// Mean of a column, ignoring nulls.
///
/// Values are sorted first so the floating point sum does not depend on row order.
fn stable_mean(column: &str) -> Expr {
    col(column).sort(SortOptions::default()).mean()
}

/// Aggregates a filtered table.
///
/// # Errors
///
/// Returns [`DashboardError::EmptyFilterResult`] when the table has no rows;
/// means over nothing are not computed.
pub fn aggregate(filtered: &ObservationTable) -> Result<AggregateResult, DashboardError> {
    if filtered.is_empty() {
        return Err(DashboardError::EmptyFilterResult);
    }

    let means_frame = filtered
        .lazy()
        .select(
            Measurement::ALL
                .iter()
                .map(|m| stable_mean(m.column()).alias(m.column()))
                .collect::<Vec<_>>(),
        )
        .collect()?;
    let mut means = MeasurementMeans::default();
    for measurement in Measurement::ALL {
        let value = means_frame
            .column(measurement.column())?
            .cast(&DataType::Float64)?
            .f64()?
            .get(0);
        means.set(measurement, value);
    }

    let hourly_profile = filtered
        .lazy()
        .group_by([col(HOUR), col(LOCATION)])
        .agg([stable_mean(TEMPERATURE).alias(TEMPERATURE)])
        .sort_by_exprs(
            vec![col(LOCATION), col(HOUR)],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let trend = filtered
        .lazy()
        .sort_by_exprs(
            vec![col(LOCATION), col(TIMESTAMP)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    debug!(
        "Aggregated {} rows into {} hourly groups",
        filtered.height(),
        hourly_profile.height()
    );

    Ok(AggregateResult {
        means,
        hourly_profile,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::row::ObservationRow;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 10, 26)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn temperatures(values: &[Option<f64>]) -> ObservationTable {
        let rows: Vec<ObservationRow> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                ObservationRow::at(Some(ts(i as u32, 0)))
                    .with_position(52.1, 5.18)
                    .with_measurement(Measurement::Temperature, *v)
            })
            .collect();
        ObservationTable::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_mean_ignores_nulls() -> Result<(), DashboardError> {
        let result = aggregate(&temperatures(&[Some(10.0), None, Some(20.0)]))?;
        assert_eq!(result.means.temperature, Some(15.0));
        Ok(())
    }

    #[test]
    fn test_all_null_mean_is_undefined() -> Result<(), DashboardError> {
        let result = aggregate(&temperatures(&[None, None]))?;
        assert_eq!(result.means.temperature, None);
        assert_eq!(result.means.pressure, None);
        assert_eq!(result.means.get(Measurement::WindSpeed), None);
        Ok(())
    }

    #[test]
    fn test_empty_table_is_not_aggregated() {
        let empty = ObservationTable::from_rows(&[]).unwrap();
        assert!(matches!(
            aggregate(&empty),
            Err(DashboardError::EmptyFilterResult)
        ));
    }

    #[test]
    fn test_means_are_permutation_invariant() -> Result<(), DashboardError> {
        // Summing these in different orders gives different floating point results.
        let values = [1e16, 1.0, -1e16, 0.1, 0.2, 0.3];

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let reference = Series::new(TEMPERATURE.into(), sorted).mean();
        assert!(reference.is_some());

        let orders: [[usize; 6]; 6] = [
            [0, 1, 2, 3, 4, 5],
            [5, 4, 3, 2, 1, 0],
            [2, 0, 1, 5, 3, 4],
            [1, 3, 5, 0, 2, 4],
            [3, 4, 5, 1, 0, 2],
            [0, 2, 1, 4, 5, 3],
        ];
        for order in orders {
            let permuted: Vec<Option<f64>> = order.iter().map(|&i| Some(values[i])).collect();
            let result = aggregate(&temperatures(&permuted))?;
            assert_eq!(
                result.means.temperature.map(f64::to_bits),
                reference.map(f64::to_bits),
                "order {order:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_hourly_profile_groups_by_hour_and_location() -> Result<(), DashboardError> {
        let rows = vec![
            ObservationRow::at(Some(ts(9, 0)))
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(10.0)),
            ObservationRow::at(Some(ts(9, 30)))
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(12.0)),
            ObservationRow::at(Some(ts(10, 0)))
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(14.0)),
            ObservationRow::at(Some(ts(9, 15)))
                .with_position(48.85, 2.35)
                .with_measurement(Measurement::Temperature, Some(20.0)),
        ];
        let result = aggregate(&ObservationTable::from_rows(&rows)?)?;
        let profile = &result.hourly_profile;
        assert_eq!(profile.height(), 3);

        let locations: Vec<Option<&str>> = profile.column(LOCATION)?.str()?.into_iter().collect();
        let hours: Vec<Option<i32>> = profile.column(HOUR)?.i32()?.into_iter().collect();
        let means: Vec<Option<f64>> = profile.column(TEMPERATURE)?.f64()?.into_iter().collect();
        assert_eq!(
            locations,
            [Some("48.85,2.35"), Some("52.1,5.18"), Some("52.1,5.18")]
        );
        assert_eq!(hours, [Some(9), Some(9), Some(10)]);
        assert_eq!(means, [Some(20.0), Some(11.0), Some(14.0)]);
        Ok(())
    }

    #[test]
    fn test_trend_is_ordered_by_location_then_time() -> Result<(), DashboardError> {
        let rows = vec![
            ObservationRow::at(Some(ts(12, 0))).with_position(52.1, 5.18),
            ObservationRow::at(Some(ts(8, 0))).with_position(52.1, 5.18),
            ObservationRow::at(Some(ts(10, 0))).with_position(48.85, 2.35),
        ];
        let result = aggregate(&ObservationTable::from_rows(&rows)?)?;
        let trend = ObservationTable::from_frame(result.trend).rows()?;
        let order: Vec<(String, Option<NaiveDateTime>)> = trend
            .into_iter()
            .map(|r| (r.location, r.timestamp))
            .collect();
        assert_eq!(
            order,
            [
                ("48.85,2.35".to_string(), Some(ts(10, 0))),
                ("52.1,5.18".to_string(), Some(ts(8, 0))),
                ("52.1,5.18".to_string(), Some(ts(12, 0))),
            ]
        );
        Ok(())
    }
}
