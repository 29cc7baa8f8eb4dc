//! What the dashboard shows: KPIs, charts and a row preview.

use crate::aggregate::{AggregateResult, MeasurementMeans};
use crate::normalize::row::{Measurement, ObservationRow, HOUR, LOCATION, TEMPERATURE};
use crate::normalize::table::{timestamps, ObservationTable};
use chrono::NaiveDateTime;
use polars::prelude::{DataFrame, DataType, PolarsResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const TITLE: &str = "Weather Dashboard";
pub const DEFAULT_PREVIEW_LIMIT: usize = 200;

/// A single headline number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: &'static str,
    pub value: Option<f64>,
    /// Two decimals, or `n/a` when the value is undefined.
    pub display: String,
}

impl Kpi {
    pub fn new(label: &'static str, value: Option<f64>) -> Self {
        let display = match value {
            Some(v) => format!("{:.2}", v),
            None => "n/a".to_string(),
        };
        Self {
            label,
            value,
            display,
        }
    }

    fn label_for(measurement: Measurement) -> &'static str {
        match measurement {
            Measurement::Temperature => "Avg Temp (°C)",
            Measurement::Dewpoint => "Avg Dewpoint (°C)",
            Measurement::WindSpeed => "Avg Wind (m/s)",
            Measurement::Pressure => "Avg Pressure",
        }
    }

    pub fn from_means(means: &MeasurementMeans) -> Vec<Kpi> {
        Measurement::ALL
            .iter()
            .map(|&m| Kpi::new(Self::label_for(m), means.get(m)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartX {
    Time(NaiveDateTime),
    Hour(i32),
}

impl fmt::Display for ChartX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartX::Time(t) => write!(f, "{}", t),
            ChartX::Hour(h) => write!(f, "{:02}h", h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: ChartX,
    pub y: f64,
}

/// The points of one location, in x order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub location: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub markers: bool,
    pub series: Vec<ChartSeries>,
}

impl Chart {
    /// One series per location of `measurement` against time. Null readings are skipped.
    fn over_time(
        title: &'static str,
        measurement: Measurement,
        markers: bool,
        trend: &DataFrame,
    ) -> PolarsResult<Self> {
        let times = timestamps(trend)?;
        let locations = trend.column(LOCATION)?.str()?;
        let values = trend.column(measurement.column())?.f64()?;
        let points = times.into_iter().enumerate().filter_map(|(i, t)| {
            let x = ChartX::Time(t?);
            let y = values.get(i)?;
            Some((locations.get(i)?.to_string(), ChartPoint { x, y }))
        });
        Ok(Self {
            title,
            x_label: "timestamp",
            y_label: measurement.column(),
            markers,
            series: group_series(points),
        })
    }

    fn hourly(profile: &DataFrame) -> PolarsResult<Self> {
        let hours = profile.column(HOUR)?.cast(&DataType::Int32)?;
        let hours = hours.i32()?;
        let locations = profile.column(LOCATION)?.str()?;
        let values = profile.column(TEMPERATURE)?.f64()?;
        let points = (0..profile.height()).filter_map(|i| {
            let x = ChartX::Hour(hours.get(i)?);
            let y = values.get(i)?;
            Some((locations.get(i)?.to_string(), ChartPoint { x, y }))
        });
        Ok(Self {
            title: "Hourly Profile",
            x_label: HOUR,
            y_label: TEMPERATURE,
            markers: true,
            series: group_series(points),
        })
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Groups `(location, point)` pairs by location, keeping point order within each location.
fn group_series(points: impl Iterator<Item = (String, ChartPoint)>) -> Vec<ChartSeries> {
    let mut by_location: BTreeMap<String, Vec<ChartPoint>> = BTreeMap::new();
    for (location, point) in points {
        by_location.entry(location).or_default().push(point);
    }
    by_location
        .into_iter()
        .map(|(location, points)| ChartSeries { location, points })
        .collect()
}

/// Everything rendered for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: &'static str,
    pub caption: String,
    pub kpis: Vec<Kpi>,
    pub temperature_trend: Chart,
    pub hourly_profile: Chart,
    pub pressure_trend: Chart,
    pub preview: Vec<ObservationRow>,
    /// Rows that survived the filter; the preview may show fewer.
    pub filtered_rows: usize,
}

impl DashboardView {
    pub fn new(
        source_description: &str,
        filtered: &ObservationTable,
        aggregate: &AggregateResult,
        preview_limit: usize,
    ) -> PolarsResult<Self> {
        Ok(Self {
            title: TITLE,
            caption: format!("Observations from {}", source_description),
            kpis: Kpi::from_means(&aggregate.means),
            temperature_trend: Chart::over_time(
                "Temperature Over Time",
                Measurement::Temperature,
                true,
                &aggregate.trend,
            )?,
            hourly_profile: Chart::hourly(&aggregate.hourly_profile)?,
            pressure_trend: Chart::over_time(
                "Pressure Trend",
                Measurement::Pressure,
                false,
                &aggregate.trend,
            )?,
            preview: filtered.head_rows(preview_limit)?,
            filtered_rows: filtered.height(),
        })
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.caption)?;
        writeln!(f)?;
        for kpi in &self.kpis {
            writeln!(f, "  {:<18} {:>10}", kpi.label, kpi.display)?;
        }
        for chart in [
            &self.temperature_trend,
            &self.hourly_profile,
            &self.pressure_trend,
        ] {
            writeln!(f)?;
            writeln!(
                f,
                "{} ({} vs {}, {} points)",
                chart.title,
                chart.y_label,
                chart.x_label,
                chart.point_count()
            )?;
            for series in &chart.series {
                let first = series.points.first();
                let last = series.points.last();
                match (first, last) {
                    (Some(first), Some(last)) => writeln!(
                        f,
                        "  {:<20} {:>5} points  {} .. {}",
                        series.location,
                        series.points.len(),
                        first.x,
                        last.x
                    )?,
                    _ => writeln!(f, "  {:<20} no points", series.location)?,
                }
            }
        }
        writeln!(f)?;
        writeln!(
            f,
            "Preview ({} of {} rows)",
            self.preview.len(),
            self.filtered_rows
        )?;
        writeln!(
            f,
            "{:<23} {:<20} {:>11} {:>9} {:>10} {:>9}",
            "timestamp", "location", "temperature", "dewpoint", "wind_speed", "pressure"
        )?;
        for row in &self.preview {
            let timestamp = row
                .timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            writeln!(
                f,
                "{:<23} {:<20} {:>11} {:>9} {:>10} {:>9}",
                timestamp,
                row.location,
                fmt_opt(row.temperature),
                fmt_opt(row.dewpoint),
                fmt_opt(row.wind_speed),
                fmt_opt(row.pressure)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::error::DashboardError;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 10, 26)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn view(preview_limit: usize) -> Result<DashboardView, DashboardError> {
        let rows = vec![
            ObservationRow::at(Some(ts(10)))
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(12.0))
                .with_measurement(Measurement::Pressure, Some(1010.0)),
            ObservationRow::at(Some(ts(8)))
                .with_position(52.1, 5.18)
                .with_measurement(Measurement::Temperature, Some(8.0)),
            ObservationRow::at(Some(ts(9)))
                .with_position(48.85, 2.35)
                .with_measurement(Measurement::Temperature, None)
                .with_measurement(Measurement::Pressure, Some(1020.0)),
        ];
        let table = ObservationTable::from_rows(&rows)?;
        let result = aggregate(&table)?;
        Ok(DashboardView::new("memory:test", &table, &result, preview_limit)?)
    }

    #[test]
    fn test_kpi_formatting() {
        assert_eq!(Kpi::new("Avg Temp (°C)", Some(12.345)).display, "12.35");
        assert_eq!(Kpi::new("Avg Temp (°C)", Some(3.0)).display, "3.00");
        assert_eq!(Kpi::new("Avg Pressure", None).display, "n/a");
    }

    #[test]
    fn test_view_kpis_and_charts() -> Result<(), DashboardError> {
        let view = view(200)?;
        assert_eq!(view.title, "Weather Dashboard");
        assert_eq!(view.caption, "Observations from memory:test");

        let labels: Vec<&str> = view.kpis.iter().map(|k| k.label).collect();
        assert_eq!(
            labels,
            ["Avg Temp (°C)", "Avg Dewpoint (°C)", "Avg Wind (m/s)", "Avg Pressure"]
        );
        assert_eq!(view.kpis[0].display, "10.00");
        assert_eq!(view.kpis[1].display, "n/a");
        assert_eq!(view.kpis[3].display, "1015.00");

        let temperature = &view.temperature_trend;
        assert_eq!(temperature.title, "Temperature Over Time");
        assert!(temperature.markers);
        // The null reading at 48.85,2.35 leaves that location without temperature points.
        assert_eq!(temperature.series.len(), 1);
        assert_eq!(temperature.series[0].location, "52.1,5.18");
        assert_eq!(
            temperature.series[0].points,
            [
                ChartPoint { x: ChartX::Time(ts(8)), y: 8.0 },
                ChartPoint { x: ChartX::Time(ts(10)), y: 12.0 },
            ]
        );

        assert_eq!(view.pressure_trend.title, "Pressure Trend");
        assert!(!view.pressure_trend.markers);
        assert_eq!(view.pressure_trend.series.len(), 2);

        assert_eq!(view.hourly_profile.title, "Hourly Profile");
        assert_eq!(view.hourly_profile.point_count(), 2);
        assert_eq!(
            view.hourly_profile.series[0].points[0],
            ChartPoint { x: ChartX::Hour(8), y: 8.0 }
        );
        Ok(())
    }

    #[test]
    fn test_preview_is_limited() -> Result<(), DashboardError> {
        let view = view(2)?;
        assert_eq!(view.preview.len(), 2);
        assert_eq!(view.filtered_rows, 3);
        let text = view.to_string();
        assert!(text.starts_with("Weather Dashboard\n"));
        assert!(text.contains("Preview (2 of 3 rows)"));
        Ok(())
    }

    #[test]
    fn test_json_shape() -> Result<(), DashboardError> {
        let json = serde_json::to_value(view(1)?).unwrap();
        assert_eq!(json["kpis"][0]["display"], "10.00");
        assert_eq!(json["kpis"][1]["value"], serde_json::Value::Null);
        assert_eq!(json["hourly_profile"]["series"][0]["points"][0]["x"], 8);
        assert_eq!(
            json["temperature_trend"]["series"][0]["points"][0]["x"],
            "2023-10-26T08:00:00"
        );
        Ok(())
    }
}
