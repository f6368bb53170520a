//! Message channel between the popup and the background worker.
//!
//! Both sides only exchange JSON values, mirroring the runtime messaging of
//! a browser extension: the popup posts `{action: "download", ...}` and
//! suspends until exactly one reply arrives. A reply slot that is dropped
//! without an answer (unknown action, worker gone) surfaces to the sender
//! as [`AppError::ChannelClosed`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use super::orchestrator::DownloadOrchestrator;
use crate::domain::{AppError, DownloadId, DownloadRequest};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerRequest {
    Download(DownloadRequest),
}

/// `{success: true, downloadId}` or `{success: false, error}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DownloadReply {
    pub success: bool,
    #[serde(rename = "downloadId", default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<DownloadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadReply {
    pub fn accepted(download_id: DownloadId) -> Self {
        Self {
            success: true,
            download_id: Some(download_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_id: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<Option<DownloadId>, String> {
        if self.success {
            Ok(self.download_id)
        } else {
            Err(self
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Download error".to_string()))
        }
    }
}

struct RuntimeMessage {
    payload: Value,
    reply: oneshot::Sender<Value>,
}

/// Popup-side handle. Cheap to clone.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<RuntimeMessage>,
}

/// Worker-side inbox.
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<RuntimeMessage>,
}

pub fn channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessageSender { tx }, MessageReceiver { rx })
}

impl MessageSender {
    pub async fn send_message(&self, payload: Value) -> Result<Value, AppError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RuntimeMessage { payload, reply })
            .map_err(|_| AppError::ChannelClosed)?;
        response.await.map_err(|_| AppError::ChannelClosed)
    }

    pub async fn request_download(&self, request: DownloadRequest) -> Result<DownloadReply, AppError> {
        let payload = serde_json::to_value(WorkerRequest::Download(request))
            .map_err(|e| AppError::Io(format!("failed to encode message: {}", e)))?;
        let reply = self.send_message(payload).await?;
        serde_json::from_value(reply).map_err(|e| AppError::Api(format!("malformed reply: {}", e)))
    }
}

/// Privileged context: receives popup messages and runs the download
/// handoff for each of them.
pub struct BackgroundWorker {
    orchestrator: DownloadOrchestrator,
}

impl BackgroundWorker {
    pub fn new(orchestrator: DownloadOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Serve messages until every [`MessageSender`] is dropped.
    pub async fn run(self, mut inbox: MessageReceiver) {
        while let Some(message) = inbox.rx.recv().await {
            self.dispatch(message);
        }
        tracing::debug!("message channel closed, background worker stopping");
    }

    /// Run the worker on a dedicated thread driving a single-threaded runtime.
    pub fn spawn(self, inbox: MessageReceiver) -> std::io::Result<std::thread::JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name("background-worker".to_string())
            .spawn(move || runtime.block_on(self.run(inbox)))
    }

    fn dispatch(&self, message: RuntimeMessage) {
        let RuntimeMessage { payload, reply } = message;

        let request = match serde_json::from_value::<WorkerRequest>(payload) {
            Ok(WorkerRequest::Download(request)) => request,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognised message");
                return;
            }
        };

        let orchestrator = self.orchestrator.clone();
        // The reply slot stays open until the handoff fully resolves
        tokio::spawn(async move {
            let outcome = orchestrator.handle_download(request).await;
            let value = serde_json::to_value(&outcome)
                .unwrap_or_else(|e| json!({ "success": false, "error": e.to_string() }));

            if reply.send(value).is_err() {
                tracing::debug!("popup closed before the reply, dropping it");
            }
        });
    }
}
