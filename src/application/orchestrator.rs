use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::messaging::DownloadReply;
use crate::{
    api::{ApiClient, ApiError},
    domain::{AppError, DownloadId, DownloadRequest},
};

/// A job for the download manager. Name clashes in the target directory
/// are resolved by picking a fresh `name (n).ext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub url: String,
}

/// The platform download manager. Resolves once the job is accepted or
/// rejected; the transfer itself is not observed here.
#[async_trait]
pub trait DownloadManager: Send + Sync {
    async fn download(&self, options: DownloadOptions) -> Result<DownloadId, AppError>;
}

#[derive(Debug, Error)]
enum HandoffError {
    #[error(transparent)]
    Prepare(#[from] ApiError),

    #[error(transparent)]
    Download(#[from] AppError),
}

/// Background side of the prepare-then-trigger download protocol.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    api_client: ApiClient,
    downloads: Arc<dyn DownloadManager>,
}

impl DownloadOrchestrator {
    pub fn new(api_client: ApiClient, downloads: Arc<dyn DownloadManager>) -> Self {
        Self {
            api_client,
            downloads,
        }
    }

    /// Runs both phases and folds the outcome into the single reply sent
    /// back to the popup.
    pub async fn handle_download(&self, request: DownloadRequest) -> DownloadReply {
        match self.hand_off(&request).await {
            Ok(download_id) => {
                tracing::info!(download_id, url = %request.url, "download started");
                DownloadReply::accepted(download_id)
            }
            Err(HandoffError::Prepare(e)) => {
                tracing::error!(error = %e, "preparation error");
                DownloadReply::failed(e.to_string())
            }
            Err(HandoffError::Download(e)) => {
                tracing::error!(error = %e, "download start error");
                DownloadReply::failed(e.to_string())
            }
        }
    }

    async fn hand_off(&self, request: &DownloadRequest) -> Result<DownloadId, HandoffError> {
        let token = self.api_client.prepare_download(request).await?;
        let url = self.api_client.trigger_url(&token)?;

        let download_id = self
            .downloads
            .download(DownloadOptions { url })
            .await?;

        Ok(download_id)
    }
}
