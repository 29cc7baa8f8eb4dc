//! Document store access over HTTP.
//!
//! Two shapes of endpoint are supported. A base URL of a document store HTTP
//! API receives `find` actions with an empty filter, one page at a time. A URL
//! pointing at a JSON export (`.json`, `.ndjson`, optionally `.gz`) is
//! downloaded as-is.

use crate::cache::QueryKey;
use crate::source::document::RawDocument;
use crate::source::error::{BoxError, SourceError};
use crate::source::{parse_documents, DocumentSource};
use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use bon::bon;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::{Client, Response};
use serde_json::json;
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

/// Default bound on connecting to and querying the store.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Documents requested per `find` action.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const DEFAULT_DATA_SOURCE: &str = "Cluster0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    FindAction,
    Export { gzip: bool },
}

impl Endpoint {
    fn detect(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let gzip = path.ends_with(".gz");
        let path = path.trim_end_matches(".gz");
        if path.ends_with(".json") || path.ends_with(".ndjson") || path.ends_with(".jsonl") {
            Endpoint::Export { gzip }
        } else {
            Endpoint::FindAction
        }
    }
}

/// Reads a whole collection from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    url: String,
    database: String,
    collection: String,
    data_source: String,
    api_key: Option<String>,
    timeout: Duration,
    page_size: usize,
    endpoint: Endpoint,
    client: Client,
}

#[bon]
impl HttpDocumentSource {
    /// Creates a source for `collection` in `database` behind `url`.
    ///
    /// # Arguments
    ///
    /// * `.url(&str)`: **Required.** API base URL or direct export URL.
    /// * `.database(&str)`: **Required.** Database name sent with `find` actions.
    /// * `.collection(&str)`: **Required.** Collection name sent with `find` actions.
    /// * `.timeout(Duration)`: Optional. Connect and request bound, defaults to [`DEFAULT_TIMEOUT`].
    /// * `.api_key(String)`: Optional. Sent as the `api-key` header.
    /// * `.data_source(String)`: Optional. Cluster name for `find` actions, defaults to `Cluster0`.
    /// * `.page_size(usize)`: Optional. Documents per `find` action, defaults to [`DEFAULT_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ClientBuild`] if the HTTP client cannot be constructed.
    #[builder]
    pub fn new(
        url: &str,
        database: &str,
        collection: &str,
        timeout: Option<Duration>,
        api_key: Option<String>,
        data_source: Option<String>,
        page_size: Option<usize>,
    ) -> Result<Self, SourceError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(SourceError::ClientBuild)?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            data_source: data_source.unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string()),
            api_key,
            timeout,
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            endpoint: Endpoint::detect(url),
            client,
        })
    }

    fn unavailable<E>(&self, url: &str, source: E) -> SourceError
    where
        E: Into<BoxError> + std::fmt::Display,
    {
        warn!("Document store at {} unreachable: {}", url, source);
        SourceError::Unavailable {
            endpoint: url.to_string(),
            timeout: self.timeout,
            source: source.into(),
        }
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> SourceError {
        if e.is_timeout() || e.is_connect() {
            self.unavailable(url, e)
        } else {
            SourceError::NetworkRequest(url.to_string(), e)
        }
    }

    /// Sends one request. `skip` selects the page for `find` actions.
    async fn send(&self, skip: usize) -> Result<(String, Response), SourceError> {
        let (url, request) = match self.endpoint {
            Endpoint::FindAction => {
                let url = format!("{}/action/find", self.url);
                let body = json!({
                    "dataSource": self.data_source,
                    "database": self.database,
                    "collection": self.collection,
                    "filter": {},
                    "sort": {"_id": 1},
                    "skip": skip,
                    "limit": self.page_size,
                });
                (url.clone(), self.client.post(url).json(&body))
            }
            Endpoint::Export { .. } => (self.url.clone(), self.client.get(&self.url)),
        };
        let request = match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        };

        debug!("Requesting {} (skip {})", url, skip);
        let response = request.send().await.map_err(|e| self.classify(&url, e))?;

        match response.error_for_status() {
            Ok(resp) => Ok((url, resp)),
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                Err(if let Some(status) = e.status() {
                    SourceError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    SourceError::NetworkRequest(url, e)
                })
            }
        }
    }

    async fn read_body(
        &self,
        url: &str,
        response: Response,
        gzip: bool,
    ) -> Result<Vec<u8>, SourceError> {
        // Keep timeouts recognizable once they are wrapped as io errors.
        let stream = response.bytes_stream().map_err(|e| {
            let kind = if e.is_timeout() {
                io::ErrorKind::TimedOut
            } else {
                io::ErrorKind::Other
            };
            io::Error::new(kind, e)
        });
        let mut stream_reader = StreamReader::new(stream);
        let mut body = Vec::new();
        let read = if gzip {
            GzipDecoder::new(stream_reader).read_to_end(&mut body).await
        } else {
            stream_reader.read_to_end(&mut body).await
        };
        match read {
            Ok(_) => Ok(body),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(self.unavailable(url, e)),
            Err(e) => Err(SourceError::DownloadIo(e)),
        }
    }

    /// Issues `find` actions until a page comes back short.
    async fn fetch_pages(&self) -> Result<Vec<RawDocument>, SourceError> {
        let mut documents = Vec::new();
        let mut pages = 0;
        loop {
            let (url, response) = self.send(documents.len()).await?;
            let body = self.read_body(&url, response, false).await?;
            let page = parse_documents(&body, &url)?;
            let full = page.len() >= self.page_size;
            pages += 1;
            debug!("Page {} from {} held {} documents", pages, url, page.len());
            documents.extend(page);
            if !full {
                break;
            }
        }
        info!(
            "Fetched {} documents in {} pages from {}",
            documents.len(),
            pages,
            self.describe()
        );
        Ok(documents)
    }

    async fn fetch_export(&self, gzip: bool) -> Result<Vec<RawDocument>, SourceError> {
        let (url, response) = self.send(0).await?;
        let body = self.read_body(&url, response, gzip).await?;
        let documents = parse_documents(&body, &url)?;
        info!(
            "Fetched {} documents ({} bytes) from {}",
            documents.len(),
            body.len(),
            url
        );
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        info!("Fetching documents from {}", self.describe());
        match self.endpoint {
            Endpoint::FindAction => self.fetch_pages().await,
            Endpoint::Export { gzip } => self.fetch_export(gzip).await,
        }
    }

    fn describe(&self) -> String {
        match self.endpoint {
            Endpoint::FindAction => format!("{} ({}/{})", self.url, self.database, self.collection),
            Endpoint::Export { .. } => self.url.clone(),
        }
    }

    fn query_key(&self) -> QueryKey {
        match self.endpoint {
            Endpoint::FindAction => {
                QueryKey::new(self.url.clone()).scoped(&self.database, &self.collection)
            }
            Endpoint::Export { .. } => QueryKey::new(self.url.clone()),
        }
    }
}
