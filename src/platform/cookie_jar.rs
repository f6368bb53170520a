use std::path::PathBuf;

use async_trait::async_trait;

use crate::application::cookies::CookieStore;
use crate::domain::{AppError, Cookie};

/// Cookie store backed by a JSON export of browser cookies.
///
/// The file is re-read on every query; nothing is cached.
pub struct CookieJarFile {
    path: PathBuf,
}

impl CookieJarFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CookieStore for CookieJarFile {
    async fn get_all(&self, domain: &str) -> Result<Vec<Cookie>, AppError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                AppError::Permission(self.path.display().to_string())
            } else {
                AppError::Io(format!("{}: {}", self.path.display(), e))
            }
        })?;

        let cookies: Vec<Cookie> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Io(format!("invalid cookie jar {}: {}", self.path.display(), e)))?;

        Ok(cookies
            .into_iter()
            .filter(|c| c.matches_host(domain))
            .collect())
    }
}
