//! External collaborator seams: the central bibliographic database and the
//! source file store.
//!
//! Both are read-only inputs to the pipeline. The catalogue hands back
//! bibliographic facts for a symbol; the file store resolves the latest
//! file per symbol/language and serves its bytes.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::api::token::describe_request_error;
use crate::error::OdsError;
use crate::language::Language;
use crate::model::CbMetadataSnapshot;

/// Query-by-symbol access to the central bibliographic database.
#[async_trait]
pub trait CatalogueSource: Send + Sync {
    /// Facts for a symbol, or `None` when the catalogue has no record.
    async fn snapshot(&self, docsymbol: &str) -> Result<Option<CbMetadataSnapshot>, OdsError>;
}

/// A resolved source file: where it lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceFile {
    pub filename: String,
    pub uri: String,
}

/// Latest-file resolution and retrieval.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Latest file for a symbol/language, or `None` when the store has
    /// nothing for that pair.
    async fn latest(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<SourceFile>, OdsError>;

    /// Download a resolved file to `dest`. Returns bytes written.
    async fn download(&self, file: &SourceFile, dest: &Path) -> Result<u64, OdsError>;
}

/// File store backed by an HTTP resolve endpoint plus direct URI fetch.
///
/// `latest` queries `{resolve_url}?s=<SYMBOL>&lang=<LANG>` and expects a
/// `{ filename, uri }` body; a 404 means no file for the pair. Downloads
/// stream the URI to disk chunk by chunk.
#[derive(Debug, Clone)]
pub struct HttpFileStore {
    http: Client,
    resolve_url: String,
}

impl HttpFileStore {
    pub fn new(http: Client, resolve_url: impl Into<String>) -> Self {
        Self {
            http,
            resolve_url: resolve_url.into(),
        }
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn latest(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<SourceFile>, OdsError> {
        let response = self
            .http
            .get(&self.resolve_url)
            .query(&[("s", docsymbol), ("lang", language.as_str())])
            .send()
            .await
            .map_err(|e| OdsError::LookupFailed(describe_request_error(&e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(OdsError::LookupFailed(format!(
                "file resolve returned HTTP {}",
                response.status()
            )));
        }

        let file: SourceFile = response.json().await.map_err(|e| {
            OdsError::LookupFailed(format!("malformed file resolve response: {}", e))
        })?;
        debug!(docsymbol = %docsymbol, language = %language, uri = %file.uri, "Resolved source file");
        Ok(Some(file))
    }

    async fn download(&self, file: &SourceFile, dest: &Path) -> Result<u64, OdsError> {
        // Stored URIs may omit the scheme.
        let url = if file.uri.starts_with("http://") || file.uri.starts_with("https://") {
            file.uri.clone()
        } else {
            format!("https://{}", file.uri)
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OdsError::DownloadFailed(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::DownloadFailed(format!(
                "source download returned HTTP {}",
                response.status()
            )));
        }

        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    warn!(uri = %file.uri, error = %e, "Download stream error");
                    return Err(OdsError::DownloadFailed(e.to_string()));
                }
            };
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        debug!(uri = %file.uri, bytes = written, dest = %dest.display(), "Source file downloaded");
        Ok(written)
    }
}
