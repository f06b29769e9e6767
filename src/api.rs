use crate::settings::{Settings, SourceMode};
use crate::staging::StagedFile;
use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8099";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            token: None,
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never completed (connect failure, timeout, broken body).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {detail}")]
    Backend { status: u16, detail: String },
    /// The backend answered 2xx with a body we could not read.
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed reading upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// Backend-supplied detail, if the failure came from the backend.
    #[must_use]
    pub fn backend_detail(&self) -> Option<&str> {
        match self {
            Self::Backend { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// `"{prefix}{detail}"` for backend failures, `network_message` otherwise.
    #[must_use]
    pub fn user_message(&self, prefix: &str, network_message: &str) -> String {
        match self.backend_detail() {
            Some(detail) => format!("{prefix}{detail}"),
            None => network_message.to_owned(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CaptureResults {
    #[serde(default)]
    pub faces_detected: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub results: Option<CaptureResults>,
}

impl CaptureResponse {
    #[must_use]
    pub fn faces_detected(&self) -> u32 {
        self.results
            .as_ref()
            .map_or(0, |results| results.faces_detected)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_events: u64,
    pub known_events: u64,
    pub unknown_events: u64,
    pub total_persons: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_known: bool,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub entity_id: String,
    pub friendly_name: String,
}

#[derive(Debug, Deserialize)]
struct CameraList {
    #[serde(default)]
    cameras: Vec<CameraDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
struct CameraTestRequest<'a> {
    source: &'static str,
    value: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CameraTestOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP client for the add-on backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DoorbellClient {
    base: Url,
    http: reqwest::Client,
}

impl DoorbellClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = normalize_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref()
            && !token.trim().is_empty()
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .context("access token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self { base, http })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn capture(&self) -> Result<CaptureResponse, ApiError> {
        let url = self.endpoint("api/camera/capture")?;
        let response = execute(self.http.post(url)).await?;
        read_json(response).await
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        let url = self.endpoint("api/stats")?;
        let response = execute(self.http.get(url)).await?;
        read_json(response).await
    }

    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventSummary>, ApiError> {
        let url = self.endpoint("api/events")?;
        let request = self.http.get(url).query(&[("limit", limit)]);
        let page: EventsPage = read_json(execute(request).await?).await?;
        Ok(page.events)
    }

    pub async fn cameras(&self) -> Result<Vec<CameraDescriptor>, ApiError> {
        let url = self.endpoint("api/cameras")?;
        let list: CameraList = read_json(execute(self.http.get(url)).await?).await?;
        Ok(list.cameras)
    }

    pub async fn test_camera(
        &self,
        source: SourceMode,
        value: &str,
    ) -> Result<CameraTestOutcome, ApiError> {
        let url = self.endpoint("api/camera/test")?;
        let body = CameraTestRequest {
            source: source.as_str(),
            value,
        };
        let response = execute(self.http.post(url).json(&body)).await?;
        read_json(response).await
    }

    pub async fn settings(&self) -> Result<Settings, ApiError> {
        let url = self.endpoint("api/settings")?;
        let response = execute(self.http.get(url)).await?;
        read_json(response).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), ApiError> {
        let url = self.endpoint("api/settings")?;
        execute(self.http.post(url).json(settings)).await?;
        Ok(())
    }

    pub async fn upload_face(&self, person_id: i64, file: &StagedFile) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/persons/{person_id}/faces"))?;
        let bytes = tokio::fs::read(&file.path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.file_name.clone())
            .mime_str(file.mime)
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("image", part);
        execute(self.http.post(url).multipart(form)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::InvalidRequest(format!("bad endpoint '{path}': {err}")))
    }
}

async fn execute(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    tracing::debug!(status = status.as_u16(), %detail, "backend rejected request");
    Err(ApiError::Backend {
        status: status.as_u16(),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Pulls the user-facing message out of an error body: `detail`, then `error`.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    for key in ["detail", "error"] {
        match value.get(key) {
            Some(serde_json::Value::String(text)) if !text.trim().is_empty() => {
                return Some(text.clone());
            }
            Some(serde_json::Value::Null) | None => {}
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

/// Relative endpoint paths must resolve under the base, so it always ends in `/`.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    };
    let mut parsed =
        Url::parse(&with_scheme).with_context(|| format!("invalid backend URL '{trimmed}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported backend scheme '{}'", parsed.scheme());
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed)
}
