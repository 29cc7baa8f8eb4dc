//! The raw, schema-flexible document as it comes out of the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored observation document.
///
/// Documents are not validated on the way in: any JSON object is accepted and
/// fields are looked up lazily by dotted path, the same way nested documents
/// flatten into `parent.child` column names.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use weather_dashboard::RawDocument;
///
/// let doc = RawDocument::try_from(json!({"wind": {"speed": {"rate": 4.2}}})).unwrap();
/// assert_eq!(doc.get("wind.speed.rate"), Some(&json!(4.2)));
/// assert_eq!(doc.get("wind.direction.angle"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDocument(Map<String, Value>);

impl RawDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Resolves a dotted path such as `airTemperature.value` or `ts.$date.$numberLong`.
    ///
    /// Every segment but the last must resolve to an object. Arrays are not indexed.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawDocument {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for RawDocument {
    type Error = Value;

    /// Only JSON objects are documents; anything else is handed back unchanged.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}
