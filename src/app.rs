use iced::{Subscription, Task};

use crate::{
    api::ApiClient,
    application::{
        cookies::CookieHarvester,
        history::HistoryStore,
        messaging::{DownloadReply, MessageSender},
        popup::{self, DownloadTicket, PopupController},
    },
    config::AppConfig,
    domain::{AppError, Cookie, HistoryItem, VideoAnalysis},
    platform::CookieJarFile,
    ui::{self, PopupMessage},
};

pub struct PopupApp {
    controller: PopupController,
    config: AppConfig,
    api_client: ApiClient,
    harvester: CookieHarvester,
    sender: MessageSender,
    history: HistoryStore,
}

impl PopupApp {
    /// `tab_url` stands in for the browser's active tab: a video page URL
    /// prefills the input.
    pub fn new(config: AppConfig, sender: MessageSender, tab_url: Option<&str>) -> Self {
        let harvester = match &config.cookie_jar {
            Some(path) => CookieHarvester::new(std::sync::Arc::new(CookieJarFile::new(path))),
            None => CookieHarvester::disabled(),
        };

        let mut controller = PopupController::new(config.popup.clone());
        if let Some(url) = tab_url {
            controller.suggest_from_tab(url);
        }

        Self {
            controller,
            api_client: ApiClient::new(config.server.clone()),
            history: HistoryStore::new(config.history_path()),
            harvester,
            sender,
            config,
        }
    }
}

/// Environment variable a launcher sets to the URL of the page it was
/// opened from.
pub const TAB_URL_ENV: &str = "TAKEVID_TAB_URL";

pub fn active_tab_url() -> Option<String> {
    std::env::var(TAB_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Initial state plus the dismissal timer for a notification raised while
/// starting up.
pub fn boot(
    config: AppConfig,
    sender: MessageSender,
    tab_url: Option<&str>,
) -> (PopupApp, Task<Message>) {
    let app = PopupApp::new(config, sender, tab_url);
    let task = match app.controller.notification() {
        Some(notification) => dismiss_after(&app, notification.id),
        None => Task::none(),
    };
    (app, task)
}

fn dismiss_after(app: &PopupApp, id: u64) -> Task<Message> {
    Task::perform(
        tokio::time::sleep(app.config.popup.notification_duration()),
        move |_| Message::NotificationExpired(id),
    )
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(PopupMessage),
    AnalysisFinished(u64, Result<VideoAnalysis, AppError>),
    /// Cookies harvested; the request can go to the background worker
    DownloadCookiesReady(DownloadTicket, Vec<Cookie>),
    DownloadFinished(DownloadTicket, Result<DownloadReply, AppError>),
    ProgressTick,
    CompletionElapsed(u64),
    NotificationExpired(u64),
    HistoryLoaded(Result<Vec<HistoryItem>, AppError>),
    HistorySaved(Result<Vec<HistoryItem>, AppError>),
    HistoryCleared(Result<(), AppError>),
}

pub fn update(app: &mut PopupApp, message: Message) -> Task<Message> {
    let shown_before = app.controller.notification().map(|n| n.id);
    let task = handle(app, message);

    // Every new notification gets its own dismissal timer
    match app.controller.notification().map(|n| n.id) {
        Some(id) if Some(id) != shown_before => Task::batch([task, dismiss_after(app, id)]),
        _ => task,
    }
}

fn handle(app: &mut PopupApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(ui_msg) => handle_ui(app, ui_msg),
        Message::AnalysisFinished(seq, outcome) => {
            app.controller.finish_analyze(seq, outcome);
            Task::none()
        }
        Message::DownloadCookiesReady(ticket, cookies) => {
            app.controller.download_requested(ticket.seq);
            let sender = app.sender.clone();
            let user_agent = app.config.server.user_agent.clone();
            Task::perform(
                async move {
                    let outcome =
                        popup::send_download_request(sender, &ticket, cookies, user_agent).await;
                    (ticket, outcome)
                },
                |(ticket, outcome)| Message::DownloadFinished(ticket, outcome),
            )
        }
        Message::DownloadFinished(ticket, outcome) => {
            match app.controller.finish_download(&ticket, outcome) {
                Some(item) => {
                    let store = app.history.clone();
                    let seq = ticket.seq;
                    Task::batch([
                        Task::perform(async move { store.append(item).await }, Message::HistorySaved),
                        Task::perform(
                            tokio::time::sleep(app.config.popup.completion_reset()),
                            move |_| Message::CompletionElapsed(seq),
                        ),
                    ])
                }
                None => Task::none(),
            }
        }
        Message::ProgressTick => {
            app.controller.tick_progress();
            Task::none()
        }
        Message::CompletionElapsed(seq) => {
            app.controller.completion_elapsed(seq);
            Task::none()
        }
        Message::NotificationExpired(id) => {
            app.controller.dismiss_notification(id);
            Task::none()
        }
        Message::HistoryLoaded(outcome) => {
            app.controller.history_loaded(outcome);
            Task::none()
        }
        Message::HistorySaved(outcome) => {
            app.controller.history_saved(outcome);
            Task::none()
        }
        Message::HistoryCleared(outcome) => {
            app.controller.history_cleared(outcome);
            Task::none()
        }
    }
}

fn handle_ui(app: &mut PopupApp, message: PopupMessage) -> Task<Message> {
    match message {
        PopupMessage::UrlChanged(url) => {
            app.controller.set_url_input(url);
            Task::none()
        }
        PopupMessage::AnalyzePressed => match app.controller.begin_analyze() {
            Some(ticket) => {
                let seq = ticket.seq;
                Task::perform(
                    popup::run_analysis(app.api_client.clone(), app.harvester.clone(), ticket),
                    move |outcome| Message::AnalysisFinished(seq, outcome),
                )
            }
            None => Task::none(),
        },
        PopupMessage::FormatSelected(id) => {
            if let Err(e) = app.controller.select_format(&id) {
                tracing::warn!(error = %e, "ignoring format selection");
            }
            Task::none()
        }
        PopupMessage::DownloadPressed => match app.controller.begin_download() {
            Some(ticket) => {
                let harvester = app.harvester.clone();
                Task::perform(
                    async move {
                        let cookies = popup::harvest_download_cookies(harvester, &ticket).await;
                        (ticket, cookies)
                    },
                    |(ticket, cookies)| Message::DownloadCookiesReady(ticket, cookies),
                )
            }
            None => Task::none(),
        },
        PopupMessage::ResetPressed => {
            app.controller.reset();
            Task::none()
        }
        PopupMessage::HistoryPressed => {
            if app.controller.show_history() {
                let store = app.history.clone();
                Task::perform(async move { store.all().await }, Message::HistoryLoaded)
            } else {
                Task::none()
            }
        }
        PopupMessage::HistoryBackPressed => {
            app.controller.leave_history();
            Task::none()
        }
        PopupMessage::BackPressed => {
            app.controller.back();
            Task::none()
        }
        PopupMessage::ClearHistoryPressed => {
            let store = app.history.clone();
            Task::perform(async move { store.clear().await }, Message::HistoryCleared)
        }
    }
}

pub fn subscription(app: &PopupApp) -> Subscription<Message> {
    if app.controller.is_downloading() {
        iced::time::every(app.config.popup.progress_tick()).map(|_| Message::ProgressTick)
    } else {
        Subscription::none()
    }
}

pub fn view(app: &PopupApp) -> iced::Element<'_, Message> {
    ui::view(&app.controller).map(Message::Ui)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messaging;

    #[tokio::test]
    async fn boot_prefills_video_tab_url() {
        let (sender, _inbox) = messaging::channel();
        let (app, _) = boot(
            AppConfig::default(),
            sender,
            Some("https://www.youtube.com/watch?v=abc123"),
        );
        assert_eq!(app.controller.url_input(), "https://www.youtube.com/watch?v=abc123");
        assert_eq!(
            app.controller.notification().map(|n| n.text.as_str()),
            Some("Video link pulled from tab!")
        );
    }

    #[tokio::test]
    async fn boot_ignores_non_video_tab_url() {
        let (sender, _inbox) = messaging::channel();
        let (app, _) = boot(
            AppConfig::default(),
            sender,
            Some("https://www.tiktok.com/explore"),
        );
        assert_eq!(app.controller.url_input(), "");
        assert!(app.controller.notification().is_none());
    }
}
