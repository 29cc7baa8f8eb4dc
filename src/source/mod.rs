//! Fetching raw observation documents from wherever they are stored.

pub mod document;
pub mod error;
pub mod file;
pub mod http;
pub mod memory;
pub mod mongo;

use crate::cache::QueryKey;
use crate::source::document::RawDocument;
use crate::source::error::SourceError;
use async_trait::async_trait;
use log::warn;
use serde_json::Value;

/// A collection of observation documents that can be read in full.
///
/// Implementations perform a full scan: no filter is pushed down to the store.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches every document of the collection, in no particular order.
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError>;

    /// Short human readable description used in logs and captions.
    fn describe(&self) -> String;

    /// Identifies this query in the observation cache.
    fn query_key(&self) -> QueryKey {
        QueryKey::new(self.describe())
    }
}

/// Parses a document payload.
///
/// Accepts a JSON array of documents, a `{"documents": [...]}` envelope, a single
/// document object, or newline-delimited JSON (one document per line).
pub(crate) fn parse_documents(bytes: &[u8], origin: &str) -> Result<Vec<RawDocument>, SourceError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => documents_from_value(value, origin),
        Err(whole_err) => {
            let text = std::str::from_utf8(bytes).map_err(|_| SourceError::JsonParse {
                origin: origin.to_string(),
                source: whole_err,
            })?;
            let mut documents = Vec::new();
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let value: Value =
                    serde_json::from_str(line).map_err(|source| SourceError::JsonParse {
                        origin: origin.to_string(),
                        source,
                    })?;
                documents.extend(documents_from_value(value, origin)?);
            }
            Ok(documents)
        }
    }
}

fn documents_from_value(value: Value, origin: &str) -> Result<Vec<RawDocument>, SourceError> {
    match value {
        Value::Array(items) => Ok(collect_objects(items, origin)),
        Value::Object(mut fields) => match fields.remove("documents") {
            Some(Value::Array(items)) => Ok(collect_objects(items, origin)),
            Some(other) => {
                // Not an envelope after all, just a document with a "documents" field.
                fields.insert("documents".to_string(), other);
                Ok(vec![RawDocument::new(fields)])
            }
            None => Ok(vec![RawDocument::new(fields)]),
        },
        other => Err(SourceError::UnexpectedPayload {
            origin: origin.to_string(),
            message: format!("expected an array or object, found {}", json_kind(&other)),
        }),
    }
}

fn collect_objects(items: Vec<Value>, origin: &str) -> Vec<RawDocument> {
    let total = items.len();
    let documents: Vec<RawDocument> = items
        .into_iter()
        .filter_map(|item| RawDocument::try_from(item).ok())
        .collect();
    if documents.len() != total {
        warn!(
            "Skipped {} non-object entries in payload from {}",
            total - documents.len(),
            origin
        );
    }
    documents
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
