pub mod cookies;
pub mod history;
pub mod messaging;
pub mod orchestrator;
pub mod popup;

pub use cookies::{CookieHarvester, CookieStore};
pub use history::HistoryStore;
pub use messaging::{BackgroundWorker, DownloadReply, MessageReceiver, MessageSender};
pub use orchestrator::{DownloadManager, DownloadOptions, DownloadOrchestrator};
pub use popup::{PopupController, PopupState};
