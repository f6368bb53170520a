//! Concrete stand-ins for the browser services the extension relies on.

pub mod cookie_jar;
pub mod downloads;

pub use cookie_jar::CookieJarFile;
pub use downloads::{DownloadState, HttpDownloadManager};
