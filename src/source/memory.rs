use crate::source::document::RawDocument;
use crate::source::error::SourceError;
use crate::source::DocumentSource;
use async_trait::async_trait;

/// A fixed set of documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSource {
    name: String,
    documents: Vec<RawDocument>,
}

impl MemoryDocumentSource {
    pub fn new(name: impl Into<String>, documents: Vec<RawDocument>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        Ok(self.documents.clone())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}
