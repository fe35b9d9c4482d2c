//! HTTP client for the remote document-parsing service.
//!
//! Every JSON endpoint answers with the envelope `{code, msg, data}`; a call
//! succeeds only when the HTTP status is 2xx **and** `code == 0`. Anything
//! else becomes [`PdfLayoutError::RemoteApi`] carrying the service message.
//!
//! Two reqwest clients are kept: a short-timeout one for JSON calls and a
//! long-timeout one for archive downloads and file uploads.

use super::archive;
use super::types::{
    ArchiveContents, BatchFile, BatchStatus, BatchUpload, SubmitOptions, TaskStatus,
};
use crate::config::ParserApiConfig;
use crate::error::PdfLayoutError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

const SERVICE: &str = "MinerU";

/// Client for the parsing service.
#[derive(Debug, Clone)]
pub struct ParserClient {
    config: ParserApiConfig,
    api: Client,
    transfer: Client,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
    model_version: &'a str,
    #[serde(flatten)]
    options: &'a SubmitOptions,
}

#[derive(Serialize)]
struct BatchUrlRequest<'a> {
    files: &'a [BatchFile],
    model_version: &'a str,
}

#[derive(Deserialize)]
struct TaskCreated {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Deserialize)]
struct BatchCreated {
    #[serde(default)]
    batch_id: Option<String>,
    #[serde(default)]
    file_urls: Vec<String>,
}

impl ParserClient {
    pub fn new(config: ParserApiConfig) -> Result<Self, PdfLayoutError> {
        let api = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PdfLayoutError::Internal(format!("HTTP client: {e}")))?;
        let transfer = Client::builder()
            .timeout(Duration::from_secs(config.transfer_timeout_secs))
            .build()
            .map_err(|e| PdfLayoutError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            api,
            transfer,
        })
    }

    pub fn config(&self) -> &ParserApiConfig {
        &self.config
    }

    /// Create a parsing job for a publicly reachable file URL.
    ///
    /// `model_version` falls back to the configured default.
    pub async fn submit(
        &self,
        file_url: &str,
        model_version: Option<&str>,
        options: &SubmitOptions,
    ) -> Result<String, PdfLayoutError> {
        let body = SubmitRequest {
            url: file_url,
            model_version: self.model_version(model_version),
            options,
        };
        info!("Submitting parsing task for {}", file_url);

        let request = self
            .authorized(self.api.post(self.endpoint("extract/task")))?
            .json(&body);
        let created: TaskCreated = self.call(request).await?;

        let task_id = created
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PdfLayoutError::Protocol {
                service: SERVICE.into(),
                detail: "response has no task_id".into(),
            })?;
        info!("Task created: {}", task_id);
        Ok(task_id)
    }

    /// Query the current state of a job.
    pub async fn poll(&self, task_id: &str) -> Result<TaskStatus, PdfLayoutError> {
        debug!("Polling task {}", task_id);
        let request =
            self.authorized(self.api.get(self.endpoint(&format!("extract/task/{task_id}"))))?;
        let mut status: TaskStatus = self.call(request).await?;
        if status.task_id.is_none() {
            status.task_id = Some(task_id.to_string());
        }
        Ok(status)
    }

    /// Query the per-file states of a batch.
    pub async fn poll_batch(&self, batch_id: &str) -> Result<BatchStatus, PdfLayoutError> {
        debug!("Polling batch {}", batch_id);
        let request = self.authorized(
            self.api
                .get(self.endpoint(&format!("extract-results/batch/{batch_id}"))),
        )?;
        let mut status: BatchStatus = self.call(request).await?;
        if status.batch_id.is_none() {
            status.batch_id = Some(batch_id.to_string());
        }
        Ok(status)
    }

    /// Reserve upload URLs for `files`. The service starts parsing each file
    /// on its own once it has been uploaded.
    pub async fn request_batch_upload_urls(
        &self,
        files: &[BatchFile],
        model_version: Option<&str>,
    ) -> Result<BatchUpload, PdfLayoutError> {
        info!("Requesting upload URLs for {} file(s)", files.len());
        let body = BatchUrlRequest {
            files,
            model_version: self.model_version(model_version),
        };
        let request = self
            .authorized(self.api.post(self.endpoint("file-urls/batch")))?
            .json(&body);
        let created: BatchCreated = self.call(request).await?;

        let batch_id = created
            .batch_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PdfLayoutError::Protocol {
                service: SERVICE.into(),
                detail: "response has no batch_id".into(),
            })?;
        Ok(BatchUpload {
            batch_id,
            upload_urls: created.file_urls,
        })
    }

    /// PUT the raw bytes of `file_path` to a pre-signed `upload_url`.
    pub async fn upload(&self, file_path: &Path, upload_url: &str) -> Result<(), PdfLayoutError> {
        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|e| PdfLayoutError::io(file_path, e))?;
        info!("Uploading {} ({} bytes)", file_path.display(), bytes.len());

        let response = self
            .transfer
            .put(upload_url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error("upload", &e))?;
        if !response.status().is_success() {
            return Err(remote_error(format!("upload failed: HTTP {}", response.status())));
        }
        info!("Upload complete: {}", file_path.display());
        Ok(())
    }

    /// Download the result archive and unpack it into `destination`.
    pub async fn fetch_and_unpack(
        &self,
        archive_url: &str,
        destination: &Path,
    ) -> Result<ArchiveContents, PdfLayoutError> {
        info!("Downloading result archive: {}", archive_url);
        let response = self
            .transfer
            .get(archive_url)
            .send()
            .await
            .map_err(|e| transport_error("archive download", &e))?;
        if !response.status().is_success() {
            return Err(remote_error(format!(
                "archive download failed: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("archive download", &e))?;
        debug!("Archive size: {} bytes", bytes.len());

        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || archive::unpack(&bytes, &destination))
            .await
            .map_err(|e| PdfLayoutError::Internal(format!("archive task panicked: {e}")))?
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn model_version<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|v| !v.is_empty())
            .unwrap_or(self.config.model_version.as_str())
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, PdfLayoutError> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PdfLayoutError::Configuration {
                what: "MINERU_TOKEN".into(),
                hint: "Set MINERU_TOKEN in the environment or pass --mineru-token.".into(),
            })?;
        Ok(request.bearer_auth(token))
    }

    /// Send, check the HTTP status, unwrap the envelope and decode `data`.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PdfLayoutError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error("request", &e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error("response body", &e))?;

        if !status.is_success() {
            error!("{} returned HTTP {}", SERVICE, status);
            return Err(remote_error(format!("HTTP {}: {}", status, snippet(&text))));
        }

        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|e| PdfLayoutError::Protocol {
                service: SERVICE.into(),
                detail: format!("invalid JSON envelope: {e}"),
            })?;
        if envelope.code != Some(0) {
            let msg = envelope
                .msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            error!("{} returned code {:?}: {}", SERVICE, envelope.code, msg);
            return Err(remote_error(msg));
        }

        let data = if envelope.data.is_null() {
            Value::Object(Default::default())
        } else {
            envelope.data
        };
        serde_json::from_value(data).map_err(|e| PdfLayoutError::Protocol {
            service: SERVICE.into(),
            detail: format!("unexpected data shape: {e}"),
        })
    }
}

fn remote_error(message: String) -> PdfLayoutError {
    PdfLayoutError::RemoteApi {
        service: SERVICE.into(),
        message,
    }
}

fn transport_error(what: &str, e: &reqwest::Error) -> PdfLayoutError {
    if e.is_timeout() {
        remote_error(format!("{what} timed out: {e}"))
    } else {
        remote_error(format!("{what} failed: {e}"))
    }
}

fn snippet(body: &str) -> String {
    let mut s: String = body.chars().take(200).collect();
    if body.chars().count() > 200 {
        s.push('…');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: Option<&str>) -> ParserClient {
        ParserClient::new(ParserApiConfig {
            token: token.map(str::to_string),
            base_url: "http://127.0.0.1:1/api/v4/".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = client(Some("t"));
        assert_eq!(
            c.endpoint("extract/task"),
            "http://127.0.0.1:1/api/v4/extract/task"
        );
    }

    #[test]
    fn model_version_falls_back_to_config() {
        let c = client(Some("t"));
        assert_eq!(c.model_version(None), "vlm");
        assert_eq!(c.model_version(Some("")), "vlm");
        assert_eq!(c.model_version(Some("pipeline")), "pipeline");
    }

    #[tokio::test]
    async fn missing_token_is_configuration_error() {
        let c = client(None);
        let err = c
            .submit("https://example.com/a.pdf", None, &SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfLayoutError::Configuration { .. }), "{err}");
    }

    #[test]
    fn submit_body_flattens_options() {
        let opts = SubmitOptions {
            enable_table: Some(false),
            ..Default::default()
        };
        let body = SubmitRequest {
            url: "u",
            model_version: "vlm",
            options: &opts,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"url": "u", "model_version": "vlm", "enable_table": false})
        );
    }

    #[test]
    fn snippet_truncates() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).chars().count(), 201);
        assert_eq!(snippet("short"), "short");
    }
}
