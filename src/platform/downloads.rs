use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{
    application::orchestrator::{DownloadManager, DownloadOptions},
    domain::{AppError, DownloadId},
    utils::{sanitize_filename, uniquify_path},
};

const FALLBACK_FILENAME: &str = "download";
/// Finished or failed jobs kept around for [`HttpDownloadManager::state`].
const SETTLED_JOB_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadState {
    InProgress { received: u64, total: Option<u64> },
    Complete { path: PathBuf },
    Interrupted { error: String },
}

struct Inner {
    client: Client,
    download_dir: PathBuf,
    next_id: AtomicU64,
    jobs: Mutex<HashMap<DownloadId, DownloadState>>,
}

/// Download manager that accepts a job immediately and streams the body to
/// disk in the background.
#[derive(Clone)]
pub struct HttpDownloadManager {
    inner: Arc<Inner>,
}

impl HttpDownloadManager {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: Client::new(),
                download_dir: download_dir.into(),
                next_id: AtomicU64::new(1),
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn state(&self, id: DownloadId) -> Option<DownloadState> {
        self.inner
            .jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(&id).cloned())
    }

    fn set_state(&self, id: DownloadId, state: DownloadState) {
        if let Ok(mut jobs) = self.inner.jobs.lock() {
            jobs.insert(id, state);
        }
    }

    /// Record a final state, dropping the oldest settled jobs past
    /// [`SETTLED_JOB_LIMIT`].
    fn settle(&self, id: DownloadId, state: DownloadState) {
        let Ok(mut jobs) = self.inner.jobs.lock() else {
            return;
        };
        jobs.insert(id, state);

        let mut settled: Vec<DownloadId> = jobs
            .iter()
            .filter(|(_, s)| !matches!(s, DownloadState::InProgress { .. }))
            .map(|(id, _)| *id)
            .collect();
        if settled.len() > SETTLED_JOB_LIMIT {
            settled.sort_unstable();
            for old in &settled[..settled.len() - SETTLED_JOB_LIMIT] {
                jobs.remove(old);
            }
        }
    }

    async fn transfer(&self, id: DownloadId, url: Url) -> Result<PathBuf, AppError> {
        let response = self
            .inner
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::NativeDownload(format!("Download request failed: {}", e)))?;

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition_filename)
            .or_else(|| filename_from_url_path(&url))
            .map(|name| sanitize_filename(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
        let (path, file) = self.create_target(&name).await?;

        if let Err(e) = self.write_body(id, response, &path, file).await {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %remove_err, "failed to remove partial file");
            }
            return Err(e);
        }

        Ok(path)
    }

    async fn write_body(
        &self,
        id: DownloadId,
        response: reqwest::Response,
        path: &Path,
        mut file: tokio::fs::File,
    ) -> Result<(), AppError> {
        let total = response.content_length();
        tracing::debug!(download_id = id, path = %path.display(), ?total, "transfer started");

        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk
                .map_err(|e| AppError::NativeDownload(format!("Network error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_failure("Write error", path, e))?;
            received += chunk.len() as u64;
            self.set_state(id, DownloadState::InProgress { received, total });
        }

        file.sync_all()
            .await
            .map_err(|e| io_failure("Failed to sync file", path, e))
    }

    /// Open a fresh file in the download directory, renaming to
    /// `name (n).ext` while the name is taken.
    async fn create_target(&self, name: &str) -> Result<(PathBuf, tokio::fs::File), AppError> {
        let dir = &self.inner.download_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_failure("Failed to create directory", dir, e))?;

        loop {
            let path = uniquify_path(dir, name);
            // create_new so two jobs racing for one name cannot share it
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match opened {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_failure("Failed to create file", &path, e)),
            }
        }
    }
}

#[async_trait]
impl DownloadManager for HttpDownloadManager {
    async fn download(&self, options: DownloadOptions) -> Result<DownloadId, AppError> {
        let url = Url::parse(&options.url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| AppError::NativeDownload("Invalid URL".to_string()))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.set_state(
            id,
            DownloadState::InProgress {
                received: 0,
                total: None,
            },
        );

        let manager = self.clone();
        tokio::spawn(async move {
            match manager.transfer(id, url).await {
                Ok(path) => {
                    tracing::info!(download_id = id, path = %path.display(), "download complete");
                    manager.settle(id, DownloadState::Complete { path });
                }
                Err(e) => {
                    tracing::warn!(download_id = id, error = %e, "download interrupted");
                    manager.settle(
                        id,
                        DownloadState::Interrupted {
                            error: e.to_string(),
                        },
                    );
                }
            }
        });

        Ok(id)
    }
}

fn io_failure(what: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::NativeDownload(format!("{} {}: {}", what, path.display(), e))
}

/// Last non-empty path segment, used as a name hint.
fn filename_from_url_path(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(percent_decode(segment).unwrap_or_else(|_| segment.to_string()))
}

/// Filename from a Content-Disposition value; `filename*` wins over
/// `filename`.
fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "filename*" {
            let encoded = value
                .strip_prefix("UTF-8''")
                .or_else(|| value.strip_prefix("utf-8''"));
            if let Some(decoded) = encoded.and_then(|v| percent_decode(v).ok()) {
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .map(|v| v.replace("\\\"", "\"").replace("\\\\", "\\"))
                .unwrap_or_else(|| value.to_string());
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

fn percent_decode(input: &str) -> Result<String, std::string::FromUtf8Error> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out)
}
