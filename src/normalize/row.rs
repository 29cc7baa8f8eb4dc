use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;

pub const TIMESTAMP: &str = "timestamp";
pub const DATE: &str = "date";
pub const HOUR: &str = "hour";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const LOCATION: &str = "location";
pub const TEMPERATURE: &str = "temperature";
pub const DEWPOINT: &str = "dewpoint";
pub const WIND_SPEED: &str = "wind_speed";
pub const PRESSURE: &str = "pressure";

/// Location key of observations without usable coordinates.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// The numeric readings carried by an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Temperature,
    Dewpoint,
    WindSpeed,
    Pressure,
}

impl Measurement {
    pub const ALL: [Measurement; 4] = [
        Measurement::Temperature,
        Measurement::Dewpoint,
        Measurement::WindSpeed,
        Measurement::Pressure,
    ];

    /// Column name in the observation table.
    pub fn column(&self) -> &'static str {
        match self {
            Measurement::Temperature => TEMPERATURE,
            Measurement::Dewpoint => DEWPOINT,
            Measurement::WindSpeed => WIND_SPEED,
            Measurement::Pressure => PRESSURE,
        }
    }

    /// Dotted document path the reading is taken from.
    pub fn document_path(&self) -> &'static str {
        match self {
            Measurement::Temperature => "airTemperature.value",
            Measurement::Dewpoint => "dewPoint.value",
            Measurement::WindSpeed => "wind.speed.rate",
            Measurement::Pressure => "pressure.value",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One normalized observation. Every stored document maps to exactly one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub timestamp: Option<NaiveDateTime>,
    pub date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: String,
    pub temperature: Option<f64>,
    pub dewpoint: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
}

impl ObservationRow {
    /// A row with the given time and no position or readings.
    pub fn at(timestamp: Option<NaiveDateTime>) -> Self {
        Self {
            timestamp,
            date: timestamp.map(|t| t.date()),
            hour: timestamp.map(|t| t.hour()),
            latitude: None,
            longitude: None,
            location: UNKNOWN_LOCATION.to_string(),
            temperature: None,
            dewpoint: None,
            wind_speed: None,
            pressure: None,
        }
    }

    /// Sets latitude, longitude and the derived location key.
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self.location = location_key(latitude, longitude);
        self
    }

    pub fn with_measurement(mut self, measurement: Measurement, value: Option<f64>) -> Self {
        *self.measurement_mut(measurement) = value;
        self
    }

    pub fn measurement(&self, measurement: Measurement) -> Option<f64> {
        match measurement {
            Measurement::Temperature => self.temperature,
            Measurement::Dewpoint => self.dewpoint,
            Measurement::WindSpeed => self.wind_speed,
            Measurement::Pressure => self.pressure,
        }
    }

    fn measurement_mut(&mut self, measurement: Measurement) -> &mut Option<f64> {
        match measurement {
            Measurement::Temperature => &mut self.temperature,
            Measurement::Dewpoint => &mut self.dewpoint,
            Measurement::WindSpeed => &mut self.wind_speed,
            Measurement::Pressure => &mut self.pressure,
        }
    }
}

/// Builds the `"{lat},{lon}"` location key, both rounded to 3 decimals.
///
/// # Examples
///
/// ```
/// use weather_dashboard::location_key;
///
/// assert_eq!(location_key(51.93751, -4.0), "51.938,-4.0");
/// assert_eq!(location_key(-0.0004, 120.12), "-0.0,120.12");
/// ```
pub fn location_key(latitude: f64, longitude: f64) -> String {
    format!(
        "{},{}",
        format_coordinate(round_3(latitude)),
        format_coordinate(round_3(longitude))
    )
}

/// Half-to-even rounding of the value scaled by 1000.
fn round_3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

/// Shortest round-trip form, always with a fractional part.
fn format_coordinate(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else if value == 0.0 && value.is_sign_negative() {
        "-0.0".to_string()
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_key_rounding() {
        assert_eq!(location_key(52.1, 5.18), "52.1,5.18");
        assert_eq!(location_key(52.12345, 5.18789), "52.123,5.188");
        assert_eq!(location_key(10.0, -20.0), "10.0,-20.0");
        assert_eq!(location_key(0.0, 0.0), "0.0,0.0");
        // Exact binary halves round to even.
        assert_eq!(location_key(0.0625, 0.1875), "0.062,0.188");
    }

    #[test]
    fn test_negative_zero_keeps_sign() {
        assert_eq!(location_key(-0.0001, 1.0), "-0.0,1.0");
    }

    #[test]
    fn test_row_at_derives_calendar_fields() {
        let ts = NaiveDate::from_ymd_opt(2023, 3, 14)
            .unwrap()
            .and_hms_opt(15, 9, 26)
            .unwrap();
        let row = ObservationRow::at(Some(ts));
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2023, 3, 14));
        assert_eq!(row.hour, Some(15));
        assert_eq!(row.location, UNKNOWN_LOCATION);

        let empty = ObservationRow::at(None);
        assert_eq!(empty.date, None);
        assert_eq!(empty.hour, None);
    }

    #[test]
    fn test_measurement_accessors() {
        let row = ObservationRow::at(None)
            .with_measurement(Measurement::Pressure, Some(1013.2))
            .with_position(1.0, 2.0);
        assert_eq!(row.measurement(Measurement::Pressure), Some(1013.2));
        assert_eq!(row.measurement(Measurement::Temperature), None);
        assert_eq!(row.location, "1.0,2.0");
    }
}
