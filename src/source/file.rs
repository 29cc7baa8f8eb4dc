use crate::source::document::RawDocument;
use crate::source::error::SourceError;
use crate::source::{parse_documents, DocumentSource};
use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

/// Reads documents from a collection export on disk.
///
/// The file may hold a JSON array, a `{"documents": [...]}` envelope or one
/// document per line. Files ending in `.gz` are decompressed while reading.
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    path: PathBuf,
}

impl FileDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_gzip(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| SourceError::FileRead(self.path.clone(), e))?;
        let reader = BufReader::new(file);
        let mut bytes = Vec::new();
        if self.is_gzip() {
            GzipDecoder::new(reader)
                .read_to_end(&mut bytes)
                .await
                .map_err(|e| SourceError::FileRead(self.path.clone(), e))?;
        } else {
            let mut reader = reader;
            reader
                .read_to_end(&mut bytes)
                .await
                .map_err(|e| SourceError::FileRead(self.path.clone(), e))?;
        }

        let documents = parse_documents(&bytes, &self.describe())?;
        info!(
            "Read {} documents from {:?}",
            documents.len(),
            self.path
        );
        Ok(documents)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
