use std::sync::Arc;

use iced::{window, Size};
use takevid::{
    api::ApiClient,
    app,
    application::{messaging, BackgroundWorker, DownloadOrchestrator},
    config::AppConfig,
    logging,
    platform::HttpDownloadManager,
};

fn main() -> iced::Result {
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!(error = %e, "log file unavailable, logging to stderr");
    }

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });

    // Background context: owns the download handoff on its own thread
    let (sender, inbox) = messaging::channel();
    let downloads = Arc::new(HttpDownloadManager::new(config.download_dir()));
    let orchestrator = DownloadOrchestrator::new(ApiClient::new(config.server.clone()), downloads);
    if let Err(e) = BackgroundWorker::new(orchestrator).spawn(inbox) {
        // Downloads will then fail with a closed channel; analysis still works
        tracing::error!(error = %e, "failed to start background worker");
    }

    let tab_url = app::active_tab_url();

    iced::application(
        move || app::boot(config.clone(), sender.clone(), tab_url.as_deref()),
        app::update,
        app::view,
    )
    .title("TakeVid")
    .subscription(app::subscription)
    .window(window::Settings {
        size: Size::new(420.0, 640.0),
        ..Default::default()
    })
    .run()
}
