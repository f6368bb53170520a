use thiserror::Error;

/// Errors that reach the popup. Kept `Clone` so they can travel inside
/// UI messages; sources are rendered to strings at the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("Please paste a video URL")]
    InvalidInput,

    #[error("API error: {0}")]
    Api(String),

    #[error("{0}")]
    NativeDownload(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Background worker closed the channel before replying")]
    ChannelClosed,

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<crate::api::ApiError> for AppError {
    fn from(e: crate::api::ApiError) -> Self {
        AppError::Api(e.to_string())
    }
}
