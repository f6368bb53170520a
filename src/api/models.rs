use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Cookie, DownloadRequest, FormatKind, Quality};

/// Body of `POST /analyze`
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeBody<'a> {
    pub url: &'a str,
    pub cookies: &'a [Cookie],
}

/// Body of `POST /prepare_download`
#[derive(Debug, Clone, Serialize)]
pub struct PrepareBody<'a> {
    pub url: &'a str,
    pub format: FormatKind,
    pub quality: &'a Quality,
    pub format_id: &'a str,
    pub cookies: &'a [Cookie],
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<&'a str>,
}

impl<'a> From<&'a DownloadRequest> for PrepareBody<'a> {
    fn from(req: &'a DownloadRequest) -> Self {
        Self {
            url: &req.url,
            format: req.format_type,
            quality: &req.quality,
            format_id: &req.format_id,
            cookies: &req.cookies,
            user_agent: req.user_agent.as_deref(),
        }
    }
}

/// Configuration for the API client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Upper bound on each remote call, in seconds.
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://takevid-server.onrender.com".to_string(),
            request_timeout_secs: 60,
            user_agent: Some(format!("takevid/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}
