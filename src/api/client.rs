//! reqwest implementation of [`OdsApi`].
//!
//! Every operation acquires a fresh token (see [`TokenProvider`]) and
//! authenticates with the loading system's `Access {token}` header scheme.
//! Transport failures on read paths surface as `LookupFailed`; on the
//! metadata write they surface as `RemoteWriteRejected`, and on file
//! uploads as `UploadFailed`, so callers see one failure mode per
//! operation.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::OdsConfig;
use crate::error::OdsError;
use crate::language::Language;
use crate::model::RemoteSymbolState;

use super::token::{describe_request_error, TokenProvider};
use super::{Envelope, FileUpload, OdsApi, SymbolPayload, WriteAck};

/// HTTP client for the loading API.
#[derive(Debug, Clone)]
pub struct OdsClient {
    http: Client,
    base_url: String,
    tokens: TokenProvider,
}

impl OdsClient {
    pub fn new(config: &OdsConfig) -> Self {
        let http = Client::new();
        Self {
            tokens: TokenProvider::new(http.clone(), config),
            base_url: config.base_url.clone(),
            http,
        }
    }

    async fn access_header(&self) -> Result<String, OdsError> {
        let token = self.tokens.fetch().await?;
        Ok(format!("Access {}", token))
    }

    async fn read_envelope(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope, OdsError> {
        let auth = self.access_header().await?;
        let url = format!("{}api/loading/{}", self.base_url, endpoint);

        let response = self
            .http
            .get(&url)
            .query(query)
            .header("authorization", auth)
            .send()
            .await
            .map_err(|e| OdsError::LookupFailed(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::LookupFailed(format!(
                "{} returned HTTP {}",
                endpoint,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OdsError::LookupFailed(format!("malformed {} response: {}", endpoint, e)))
    }
}

#[async_trait]
impl OdsApi for OdsClient {
    async fn symbol_lookup(&self, docsymbol: &str) -> Result<RemoteSymbolState, OdsError> {
        let envelope = self
            .read_envelope("symbol", &[("s", docsymbol), ("em", "true")])
            .await?;

        let matches = envelope.body.meta.matches;
        debug!(docsymbol = %docsymbol, matches = matches, "Symbol lookup");

        let state = match envelope.body.data.into_iter().next() {
            Some(data) => data.into_state(matches),
            None => RemoteSymbolState {
                matches,
                ..Default::default()
            },
        };
        Ok(state)
    }

    async fn number_exists(&self, jobnumber: &str) -> Result<bool, OdsError> {
        let envelope = self
            .read_envelope("search", &[("k", jobnumber), ("em", "true")])
            .await?;
        Ok(envelope.body.meta.matches > 0)
    }

    async fn write_symbol(&self, payload: &SymbolPayload) -> Result<(), OdsError> {
        let auth = self.access_header().await?;
        let url = format!("{}api/loading/symbol", self.base_url);

        let json = serde_json::to_string(payload)
            .map_err(|e| OdsError::RemoteWriteRejected(format!("unserializable payload: {}", e)))?;
        let form = Form::new().part(
            "data",
            Part::text(json)
                .mime_str("application/json")
                .map_err(|e| OdsError::RemoteWriteRejected(e.to_string()))?,
        );

        let response = self
            .http
            .post(&url)
            .header("authorization", auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OdsError::RemoteWriteRejected(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::RemoteWriteRejected(format!(
                "metadata write returned HTTP {}",
                response.status()
            )));
        }

        let ack: WriteAck = response.json().await.map_err(|e| {
            OdsError::RemoteWriteRejected(format!("malformed write acknowledgement: {}", e))
        })?;

        if ack.status == -1 {
            let message = ack.message.unwrap_or_else(|| "status -1".to_string());
            warn!(message = %message, "Loading API rejected metadata write");
            return Err(OdsError::RemoteWriteRejected(message));
        }

        Ok(())
    }

    async fn patch_release_date(
        &self,
        docsymbol: &str,
        language: Language,
        release_date: &str,
    ) -> Result<(), OdsError> {
        let auth = self.access_header().await?;
        let url = format!("{}api/loading/symbol", self.base_url);

        let body = serde_json::json!({
            "symbol": docsymbol,
            "language": language.as_str(),
            "releaseDate": release_date,
        });

        let response = self
            .http
            .patch(&url)
            .header("authorization", auth)
            .json(&body)
            .send()
            .await
            .map_err(|e| OdsError::RemoteWriteRejected(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::RemoteWriteRejected(format!(
                "release-date patch returned HTTP {}",
                response.status()
            )));
        }

        debug!(docsymbol = %docsymbol, language = %language, "Release date patched");
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload, path: &Path) -> Result<(), OdsError> {
        let auth = self.access_header().await?;
        let url = format!("{}api/loading/file", self.base_url);

        let descriptor = serde_json::json!({
            "symbol": upload.docsymbol,
            "area": upload.area,
            "distribution": upload.distribution,
            "perLanguage": {
                (upload.language.as_str()): { "jobNumber": upload.jobnumber }
            }
        });

        let bytes = tokio::fs::read(path).await?;
        let pdf_name = format!("{}.pdf", upload.jobnumber);

        let form = Form::new()
            .part(
                "data",
                Part::text(descriptor.to_string())
                    .mime_str("application/json")
                    .map_err(|e| OdsError::UploadFailed(e.to_string()))?,
            )
            .part(
                pdf_name.clone(),
                Part::bytes(bytes)
                    .file_name(pdf_name)
                    .mime_str("application/octet-stream")
                    .map_err(|e| OdsError::UploadFailed(e.to_string()))?,
            );

        let response = self
            .http
            .post(&url)
            .header("authorization", auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OdsError::UploadFailed(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(OdsError::UploadFailed(format!(
                "file endpoint returned HTTP {}",
                response.status()
            )));
        }

        let ack: WriteAck = response.json().await.map_err(|e| {
            OdsError::UploadFailed(format!("malformed upload acknowledgement: {}", e))
        })?;

        if ack.status != 1 {
            return Err(OdsError::UploadFailed(
                ack.message
                    .unwrap_or_else(|| format!("upload status {}", ack.status)),
            ));
        }

        debug!(
            docsymbol = %upload.docsymbol,
            language = %upload.language,
            jobnumber = %upload.jobnumber,
            "File uploaded"
        );
        Ok(())
    }
}
