//! Boundary to the remote conversion service.
//!
//! The service does the real work (parsing quiz text, building QTI). This
//! module only speaks its HTTP contract:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | [`preview`](RemoteConversionClient::preview) | `POST /preview` | JSON `{ questions: [...] }` |
//! | [`download`](RemoteConversionClient::download) | `POST /download` | `application/zip` bytes |
//! | [`fetch_instructions`](RemoteConversionClient::fetch_instructions) | `GET /api/instructions` | any bytes |
//! | [`ping`](RemoteConversionClient::ping) | `GET /api/` | JSON `{ message }` |
//!
//! `/preview` and `/download` take exactly one payload: a multipart form with
//! field `file`, or a JSON body `{ "quiz_text": ... }`.
//!
//! The workflow depends on the [`RemoteConversionClient`] trait, not on
//! [`HttpConversionClient`], so tests and other transports can stand in.

use crate::config::{ExportType, WorkflowConfig};
use crate::error::QuizError;
use crate::input::InputSnapshot;
use crate::preview::{PreviewQuestion, PreviewResponse};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const PREVIEW_ENDPOINT: &str = "/preview";
pub const DOWNLOAD_ENDPOINT: &str = "/download";
pub const INSTRUCTIONS_ENDPOINT: &str = "/api/instructions";
pub const HEALTH_ENDPOINT: &str = "/api/";

/// Name used when the service does not suggest one.
pub const DEFAULT_INSTRUCTIONS_FILE_NAME: &str = "formatting_instructions.txt";

/// The downloadable formatting guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionsDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Calls the conversion service makes available.
#[async_trait]
pub trait RemoteConversionClient: Send + Sync {
    /// Parse the input into preview questions.
    async fn preview(&self, input: &InputSnapshot) -> Result<Vec<PreviewQuestion>, QuizError>;

    /// Build the final package for `input`. Returns the raw archive bytes.
    async fn download(
        &self,
        input: &InputSnapshot,
        export_type: ExportType,
    ) -> Result<Vec<u8>, QuizError>;

    /// Fetch the formatting guide.
    async fn fetch_instructions(&self) -> Result<InstructionsDocument, QuizError>;

    /// Health check. Returns the service greeting.
    async fn ping(&self) -> Result<String, QuizError>;
}

#[derive(Serialize)]
struct QuizTextBody<'a> {
    quiz_text: &'a str,
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    message: String,
}

/// [`RemoteConversionClient`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConversionClient {
    http: reqwest::Client,
    base: Url,
    timeout_secs: u64,
}

impl HttpConversionClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QuizError> {
        let mut base = Url::parse(base_url).map_err(|e| {
            QuizError::InvalidConfig(format!("server URL '{base_url}' is invalid: {e}"))
        })?;
        // Join relative paths under the base path, not beside it.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuizError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn from_config(config: &WorkflowConfig) -> Result<Self, QuizError> {
        Self::new(&config.server_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an endpoint such as `/preview` against the base URL.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, QuizError> {
        self.base
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| QuizError::Internal(format!("bad endpoint '{endpoint}': {e}")))
    }

    /// Attach the single payload for `/preview` or `/download`.
    fn with_payload(request: RequestBuilder, input: &InputSnapshot) -> RequestBuilder {
        match input {
            InputSnapshot::Text(text) => request.json(&QuizTextBody { quiz_text: text }),
            InputSnapshot::File(file) => {
                let part = Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
                request.multipart(Form::new().part("file", part))
            }
        }
    }

    /// Send a request and turn transport errors and non-2xx statuses into
    /// [`QuizError`].
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, QuizError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QuizError::Timeout {
                    endpoint: endpoint.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                QuizError::request(endpoint, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::request(endpoint, format!("HTTP {status}")));
        }
        debug!("{} → {}", endpoint, status);
        Ok(response)
    }

    fn body_error(&self, endpoint: &str, e: reqwest::Error) -> QuizError {
        if e.is_timeout() {
            QuizError::Timeout {
                endpoint: endpoint.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            QuizError::request(endpoint, format!("reading response: {e}"))
        }
    }
}

#[async_trait]
impl RemoteConversionClient for HttpConversionClient {
    async fn preview(&self, input: &InputSnapshot) -> Result<Vec<PreviewQuestion>, QuizError> {
        let url = self.endpoint_url(PREVIEW_ENDPOINT)?;
        info!("Requesting preview for {}", input.describe());
        let request = Self::with_payload(self.http.post(url), input);
        let response = self.send(PREVIEW_ENDPOINT, request).await?;

        let body: PreviewResponse = response
            .json()
            .await
            .map_err(|e| self.body_error(PREVIEW_ENDPOINT, e))?;
        debug!("Preview returned {} questions", body.questions.len());
        Ok(body.questions)
    }

    async fn download(
        &self,
        input: &InputSnapshot,
        export_type: ExportType,
    ) -> Result<Vec<u8>, QuizError> {
        let url = self.endpoint_url(DOWNLOAD_ENDPOINT)?;
        info!("Requesting {} package for {}", export_type, input.describe());
        let request = Self::with_payload(self.http.post(url), input);
        let response = self.send(DOWNLOAD_ENDPOINT, request).await?;

        // Raw bytes: no text decoding on the archive.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.body_error(DOWNLOAD_ENDPOINT, e))?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn fetch_instructions(&self) -> Result<InstructionsDocument, QuizError> {
        let url = self.endpoint_url(INSTRUCTIONS_ENDPOINT)?;
        let response = self.send(INSTRUCTIONS_ENDPOINT, self.http.get(url)).await?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name)
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS_FILE_NAME.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.body_error(INSTRUCTIONS_ENDPOINT, e))?;

        Ok(InstructionsDocument {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    async fn ping(&self) -> Result<String, QuizError> {
        let url = self.endpoint_url(HEALTH_ENDPOINT)?;
        let response = self.send(HEALTH_ENDPOINT, self.http.get(url)).await?;
        let body: HealthResponse = response
            .json()
            .await
            .map_err(|e| self.body_error(HEALTH_ENDPOINT, e))?;
        Ok(body.message)
    }
}

/// Pull `filename` out of a `Content-Disposition` header value.
///
/// Only the plain `filename=` parameter is read. Path components are stripped
/// so a hostile header cannot point outside the target directory.
fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("filename")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .and_then(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .filter(|n| !n.is_empty() && *n != "." && *n != "..")
                .map(str::to_string)
        })
}
