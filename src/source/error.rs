use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Document store at {endpoint} could not be reached within {timeout:?}")]
    Unavailable {
        endpoint: String,
        timeout: Duration,
        #[source]
        source: BoxError,
    },

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("MongoDB operation failed for {endpoint}")]
    Mongo {
        endpoint: String,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("Failed to read document export '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),

    // Covers errors during download stream processing and decompression
    #[error("Document download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to parse documents from {origin}")]
    JsonParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Payload from {origin} is not a document list: {message}")]
    UnexpectedPayload { origin: String, message: String },
}

impl SourceError {
    /// True when the store itself could not be reached, as opposed to answering badly.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceError::Unavailable { .. })
    }
}
