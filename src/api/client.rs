use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::models::{AnalyzeBody, ApiConfig, PrepareBody};
use crate::domain::{Cookie, DownloadRequest, DownloadToken, VideoAnalysis};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with an `error` field.
    #[error("{0}")]
    ServerReported(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Well-formed preparation response without a usable token.
    #[error("No download token received from server")]
    MissingToken,

    #[error("Invalid server endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// JS-style truthiness of an `error` field: absent, null, false and ""
/// mean "no error".
fn reported_error(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    client: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST a JSON body and decode the JSON answer regardless of status,
    /// since the server reports failures as `{ "error": ... }` bodies.
    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.endpoint(path);
        let timeout = self.config.request_timeout();

        let exchange = async {
            let response = self.client.post(&url).json(body).send().await?;
            let status = response.status();
            let text = response.text().await?;
            serde_json::from_str::<Value>(&text).map_err(|e| {
                ApiError::InvalidResponse(format!("{} returned {} with non-JSON body: {}", path, status, e))
            })
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ApiError::Timeout(timeout))?
    }

    /// Ask the server to inspect a video page and list its formats.
    pub async fn analyze(&self, url: &str, cookies: &[Cookie]) -> Result<VideoAnalysis> {
        tracing::debug!(url, cookies = cookies.len(), "requesting analysis");

        let json = self.post_json("analyze", &AnalyzeBody { url, cookies }).await?;

        if let Some(msg) = reported_error(&json["error"]) {
            return Err(ApiError::ServerReported(msg));
        }
        // Extractor failures can come back as a transport-level success
        if let Some(msg) = reported_error(&json["info"]["error"]) {
            return Err(ApiError::ServerReported(msg));
        }

        let mut analysis: VideoAnalysis = serde_json::from_value(json)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        if analysis.webpage_url.is_empty() {
            analysis.webpage_url = url.to_string();
        }

        Ok(analysis)
    }

    /// Phase one of the download handoff: register the request and get a
    /// single-use token back.
    pub async fn prepare_download(&self, request: &DownloadRequest) -> Result<DownloadToken> {
        tracing::debug!(
            url = %request.url,
            format_id = %request.format_id,
            "preparing download"
        );

        let json = self
            .post_json("prepare_download", &PrepareBody::from(request))
            .await?;

        if !json.is_object() {
            return Err(ApiError::InvalidResponse(format!(
                "expected object, got {}",
                json
            )));
        }

        if let Some(msg) = reported_error(&json["error"]) {
            return Err(ApiError::ServerReported(msg));
        }

        match json["token"].as_str() {
            Some(token) if !token.is_empty() => Ok(DownloadToken::new(token)),
            _ => Err(ApiError::MissingToken),
        }
    }

    /// Phase two URL, fetched by the download manager only.
    pub fn trigger_url(&self, token: &DownloadToken) -> Result<String> {
        let base = &self.config.base_url;
        let mut url = Url::parse(base)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", base, e)))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidEndpoint(base.clone()))?;
            segments
                .pop_if_empty()
                .push("trigger_download")
                .push(token.as_str());
        }

        Ok(url.into())
    }
}
