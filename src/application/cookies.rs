use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::domain::{AppError, Cookie};

/// Read access to the browser's cookie store.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Cookies whose domain matches or is a subdomain of `domain`.
    async fn get_all(&self, domain: &str) -> Result<Vec<Cookie>, AppError>;
}

/// Collects cookies for a page so the server can fetch it as the user.
/// Cookies are an optional aid: every failure degrades to an empty list.
#[derive(Clone)]
pub struct CookieHarvester {
    store: Option<Arc<dyn CookieStore>>,
}

impl CookieHarvester {
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Harvester that never finds cookies, used when no store is configured.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub async fn cookies_for(&self, url: &str) -> Vec<Cookie> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        let host = match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.to_string(),
                None => return Vec::new(),
            },
            Err(e) => {
                tracing::warn!(url, error = %e, "cookie fetch skipped, malformed url");
                return Vec::new();
            }
        };

        match store.get_all(&host).await {
            Ok(cookies) => {
                tracing::debug!(host = %host, count = cookies.len(), "harvested cookies");
                cookies
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "cookie fetch error");
                Vec::new()
            }
        }
    }
}
