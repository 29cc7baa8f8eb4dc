//! Document store access through the MongoDB driver.
//!
//! Used for `mongodb://` and `mongodb+srv://` connection strings, including
//! MongoDB-compatible services such as Azure Cosmos DB for MongoDB vCore.

use crate::cache::QueryKey;
use crate::config::APP_NAME;
use crate::source::document::RawDocument;
use crate::source::error::SourceError;
use crate::source::http::DEFAULT_TIMEOUT;
use crate::source::DocumentSource;
use async_trait::async_trait;
use bon::bon;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::time::Duration;

/// Reads a whole collection with the MongoDB driver.
#[derive(Debug, Clone)]
pub struct MongoDocumentSource {
    endpoint: String,
    database: String,
    collection: String,
    timeout: Duration,
    client: Client,
}

#[bon]
impl MongoDocumentSource {
    /// Creates a source for `collection` in `database` reached through `uri`.
    ///
    /// No connection is made here. For `mongodb+srv://` the seed list is
    /// looked up in DNS while parsing the URI.
    ///
    /// # Arguments
    ///
    /// * `.uri(&str)`: **Required.** `mongodb://` or `mongodb+srv://` connection string.
    /// * `.database(&str)`: **Required.** Database holding the observations.
    /// * `.collection(&str)`: **Required.** Collection holding the observations.
    /// * `.timeout(Duration)`: Optional. Server selection and connect bound. Defaults to the
    ///   URI's `serverSelectionTimeoutMS`, then to [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] when the SRV lookup fails and
    /// [`SourceError::Mongo`] for an invalid connection string.
    #[builder]
    pub async fn new(
        uri: &str,
        database: &str,
        collection: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, SourceError> {
        let endpoint = redact_uri(uri);
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| classify(&endpoint, timeout.unwrap_or(DEFAULT_TIMEOUT), e))?;

        let timeout = timeout
            .or(options.server_selection_timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout.get_or_insert(timeout);
        options.app_name.get_or_insert_with(|| APP_NAME.to_string());

        let client = Client::with_options(options).map_err(|e| classify(&endpoint, timeout, e))?;
        Ok(Self {
            endpoint,
            database: database.to_string(),
            collection: collection.to_string(),
            timeout,
            client,
        })
    }
}

#[async_trait]
impl DocumentSource for MongoDocumentSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        info!("Fetching documents from {}", self.describe());
        let collection = self
            .client
            .database(&self.database)
            .collection::<Document>(&self.collection);

        let to_error = |e: mongodb::error::Error| classify(&self.endpoint, self.timeout, e);
        let mut cursor = collection.find(doc! {}).await.map_err(to_error)?;
        let mut documents = Vec::new();
        let mut skipped = 0;
        while let Some(document) = cursor.try_next().await.map_err(to_error)? {
            match to_raw_document(document) {
                Some(raw) => documents.push(raw),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} documents from {} that did not convert", skipped, self.endpoint);
        }
        info!("Fetched {} documents from {}", documents.len(), self.describe());
        Ok(documents)
    }

    fn describe(&self) -> String {
        format!("{} ({}/{})", self.endpoint, self.database, self.collection)
    }

    fn query_key(&self) -> QueryKey {
        QueryKey::new(self.endpoint.clone()).scoped(&self.database, &self.collection)
    }
}

fn classify(endpoint: &str, timeout: Duration, e: mongodb::error::Error) -> SourceError {
    let unreachable = matches!(
        e.kind.as_ref(),
        ErrorKind::ServerSelection { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
    );
    if unreachable {
        warn!("Document store at {} unreachable: {}", endpoint, e);
        SourceError::Unavailable {
            endpoint: endpoint.to_string(),
            timeout,
            source: Box::new(e),
        }
    } else {
        SourceError::Mongo {
            endpoint: endpoint.to_string(),
            source: e,
        }
    }
}

/// Converts a BSON document to relaxed Extended JSON, so dates arrive as
/// `{"$date": "..."}` and plain numbers stay numbers.
fn to_raw_document(document: Document) -> Option<RawDocument> {
    match RawDocument::try_from(Bson::Document(document).into_relaxed_extjson()) {
        Ok(raw) => Some(raw),
        Err(value) => {
            debug!("Not a JSON object after conversion: {}", value);
            None
        }
    }
}

/// Drops the user info from a connection string so it can be logged.
fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let hosts = authority.rsplit_once('@').map_or(authority, |(_, hosts)| hosts);
    let path = tail.split('?').next().unwrap_or_default();
    format!("{scheme}://{hosts}{path}")
}
