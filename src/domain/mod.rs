pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    Cookie, DownloadId, DownloadPhase, DownloadRequest, DownloadToken, Format, FormatKind,
    HistoryItem, Quality, VideoAnalysis,
};
