//! Flattening raw documents into uniform observation rows.
//!
//! Normalization never fails on a field: a missing or malformed value becomes
//! `None` in the row and the row is kept.

pub mod row;
pub mod strategies;
pub mod table;

use crate::normalize::row::{Measurement, ObservationRow};
use crate::normalize::strategies::{coerce_f64, coordinates, first_success, TIMESTAMP_STRATEGIES};
use crate::source::document::RawDocument;
use log::{debug, trace};

/// Maps one document to its observation row.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use weather_dashboard::{normalize_document, RawDocument};
///
/// let doc = RawDocument::try_from(json!({
///     "ts": "2023-10-26T14:00:00Z",
///     "position": {"coordinates": [5.1857, 52.1186]},
///     "airTemperature": {"value": "bad"},
///     "pressure": {"value": 1012.4}
/// })).unwrap();
///
/// let row = normalize_document(&doc);
/// assert_eq!(row.location, "52.119,5.186");
/// assert_eq!(row.hour, Some(14));
/// assert_eq!(row.temperature, None);
/// assert_eq!(row.pressure, Some(1012.4));
/// ```
pub fn normalize_document(document: &RawDocument) -> ObservationRow {
    let timestamp = first_success(document, TIMESTAMP_STRATEGIES);
    if timestamp.is_none() {
        trace!("Document without a usable timestamp");
    }

    let mut row = ObservationRow::at(timestamp);
    if let Some((latitude, longitude)) = coordinates(document) {
        row = row.with_position(latitude, longitude);
    }

    for measurement in Measurement::ALL {
        let raw = document.get(measurement.document_path());
        let value = raw.and_then(coerce_f64);
        if let (Some(raw), None) = (raw, value) {
            trace!("Could not coerce {} value {} to a number", measurement, raw);
        }
        row = row.with_measurement(measurement, value);
    }
    row
}

/// Maps every document to a row, preserving order and count.
pub fn normalize_documents(documents: &[RawDocument]) -> Vec<ObservationRow> {
    let rows: Vec<ObservationRow> = documents.iter().map(normalize_document).collect();
    debug!(
        "Normalized {} documents: {} without timestamp, {} without coordinates",
        rows.len(),
        rows.iter().filter(|r| r.timestamp.is_none()).count(),
        rows.iter().filter(|r| r.latitude.is_none()).count(),
    );
    rows
}
