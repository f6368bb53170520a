//! Popup controller: the state machine behind the visible workflow.
//!
//! The controller itself never awaits. Operations that need I/O hand out a
//! ticket (`begin_*`), the caller runs the matching effect function below,
//! and feeds the outcome back (`finish_*`). Tickets carry sequence numbers
//! so outcomes of superseded requests are recognised and dropped.

use crate::{
    api::ApiClient,
    config::PopupConfig,
    domain::{
        AppError, Cookie, DownloadPhase, DownloadRequest, Format, FormatKind, HistoryItem,
        VideoAnalysis,
    },
    utils::is_video_page_url,
};

use super::{
    cookies::CookieHarvester,
    messaging::{DownloadReply, MessageSender},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Input,
    Loading,
    Result,
    History,
}

/// The analysis currently on screen plus the user's choice within it.
#[derive(Debug, Clone)]
pub struct Session {
    analysis: VideoAnalysis,
    selected: Option<usize>,
}

impl Session {
    fn new(analysis: VideoAnalysis) -> Self {
        let selected = analysis
            .formats
            .iter()
            .position(|f| f.kind == FormatKind::Video)
            .or(if analysis.formats.is_empty() { None } else { Some(0) });
        Self { analysis, selected }
    }

    pub fn analysis(&self) -> &VideoAnalysis {
        &self.analysis
    }

    pub fn selected_format(&self) -> Option<&Format> {
        self.selected.and_then(|i| self.analysis.formats.get(i))
    }

    fn select(&mut self, format_id: &str) -> Result<(), AppError> {
        let index = self
            .analysis
            .formats
            .iter()
            .position(|f| f.id == format_id)
            .ok_or_else(|| AppError::UnknownFormat(format_id.to_string()))?;
        self.selected = Some(index);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub text: String,
}

/// Cosmetic indicator. It only reflects protocol milestones, never bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    pub phase: DownloadPhase,
    pub percent: f32,
}

impl DownloadProgress {
    const IDLE: DownloadProgress = DownloadProgress {
        phase: DownloadPhase::Idle,
        percent: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeTicket {
    pub seq: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTicket {
    pub seq: u64,
    pub page_url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub format: Format,
}

impl DownloadTicket {
    pub fn to_request(&self, cookies: Vec<Cookie>, user_agent: Option<String>) -> DownloadRequest {
        DownloadRequest {
            url: self.page_url.clone(),
            format_type: self.format.kind,
            quality: self.format.request_quality(),
            format_id: self.format.id.clone(),
            cookies,
            user_agent,
        }
    }
}

pub struct PopupController {
    config: PopupConfig,
    state: PopupState,
    url_input: String,
    session: Option<Session>,
    analyze_seq: u64,
    download_seq: u64,
    /// Download whose progress the indicator currently shows.
    active_download: Option<u64>,
    progress: DownloadProgress,
    notification: Option<Notification>,
    notification_seq: u64,
    history: Vec<HistoryItem>,
}

impl PopupController {
    pub fn new(config: PopupConfig) -> Self {
        Self {
            config,
            state: PopupState::Input,
            url_input: String::new(),
            session: None,
            analyze_seq: 0,
            download_seq: 0,
            active_download: None,
            progress: DownloadProgress::IDLE,
            notification: None,
            notification_seq: 0,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> PopupState {
        self.state
    }

    pub fn url_input(&self) -> &str {
        &self.url_input
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn selected_format(&self) -> Option<&Format> {
        self.session.as_ref().and_then(Session::selected_format)
    }

    pub fn progress(&self) -> DownloadProgress {
        self.progress
    }

    pub fn is_downloading(&self) -> bool {
        matches!(
            self.progress.phase,
            DownloadPhase::Preparing | DownloadPhase::Downloading
        )
    }

    /// Whether the progress panel replaces the download button.
    pub fn download_panel_visible(&self) -> bool {
        self.progress.phase != DownloadPhase::Idle
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    pub fn set_url_input(&mut self, url: String) {
        self.url_input = url;
    }

    /// Prefill the input from the active tab when it is a video page.
    pub fn suggest_from_tab(&mut self, tab_url: &str) -> bool {
        if self.state != PopupState::Input || !is_video_page_url(tab_url) {
            return false;
        }
        self.url_input = tab_url.to_string();
        self.notify("Video link pulled from tab!");
        true
    }

    pub fn begin_analyze(&mut self) -> Option<AnalyzeTicket> {
        if !matches!(self.state, PopupState::Input | PopupState::Loading) {
            return None;
        }

        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.notify(AppError::InvalidInput.to_string());
            return None;
        }

        self.analyze_seq += 1;
        self.session = None;
        self.state = PopupState::Loading;
        tracing::debug!(seq = self.analyze_seq, url = %url, "analysis started");

        Some(AnalyzeTicket {
            seq: self.analyze_seq,
            url,
        })
    }

    /// Apply an analysis outcome. Returns `false` when it was stale.
    pub fn finish_analyze(&mut self, seq: u64, outcome: Result<VideoAnalysis, AppError>) -> bool {
        if seq != self.analyze_seq || self.state != PopupState::Loading {
            tracing::debug!(seq, latest = self.analyze_seq, "dropping superseded analysis");
            return false;
        }

        match outcome {
            Ok(analysis) => {
                self.session = Some(Session::new(analysis));
                self.state = PopupState::Result;
            }
            Err(e) => {
                tracing::warn!(error = %e, "analysis failed");
                self.session = None;
                self.state = PopupState::Input;
                self.notify("Analysis failed. Check your connection.");
            }
        }
        true
    }

    pub fn select_format(&mut self, format_id: &str) -> Result<(), AppError> {
        match self.session.as_mut() {
            Some(session) => session.select(format_id),
            None => Err(AppError::UnknownFormat(format_id.to_string())),
        }
    }

    pub fn show_history(&mut self) -> bool {
        if !matches!(self.state, PopupState::Input | PopupState::Result) {
            return false;
        }
        self.state = PopupState::History;
        true
    }

    pub fn leave_history(&mut self) {
        if self.state == PopupState::History {
            self.state = if self.session.is_some() {
                PopupState::Result
            } else {
                PopupState::Input
            };
        }
    }

    /// Start over from an empty input.
    pub fn reset(&mut self) {
        self.url_input.clear();
        self.discard_session();
    }

    /// Header back button.
    pub fn back(&mut self) {
        match self.state {
            PopupState::History => self.leave_history(),
            PopupState::Loading => {
                // Stop listening for the in-flight analysis
                self.analyze_seq += 1;
                self.state = PopupState::Input;
            }
            PopupState::Result => self.discard_session(),
            PopupState::Input => {}
        }
    }

    fn discard_session(&mut self) {
        self.session = None;
        self.active_download = None;
        self.progress = DownloadProgress::IDLE;
        self.state = PopupState::Input;
    }

    pub fn begin_download(&mut self) -> Option<DownloadTicket> {
        if self.state != PopupState::Result || self.is_downloading() {
            return None;
        }
        let session = self.session.as_ref()?;
        let format = session.selected_format()?.clone();
        let analysis = &session.analysis;
        let ticket = DownloadTicket {
            seq: self.download_seq + 1,
            page_url: analysis.webpage_url.clone(),
            title: analysis.title.clone(),
            thumbnail: analysis.thumbnail.clone(),
            format,
        };

        self.download_seq = ticket.seq;
        self.active_download = Some(ticket.seq);
        self.progress = DownloadProgress {
            phase: DownloadPhase::Preparing,
            percent: 0.0,
        };

        Some(ticket)
    }

    /// Cookies are in hand and the request is on its way to the worker.
    pub fn download_requested(&mut self, seq: u64) {
        if self.active_download == Some(seq) && self.progress.phase == DownloadPhase::Preparing {
            self.progress.phase = DownloadPhase::Downloading;
        }
    }

    /// Timer tick: creep toward the cap, slowing down as it gets closer.
    pub fn tick_progress(&mut self) {
        if !self.is_downloading() {
            return;
        }
        let cap = self.config.progress_ceiling();
        let step = ((cap - self.progress.percent) / 10.0).clamp(0.5, 5.0);
        self.progress.percent = (self.progress.percent + step).min(cap);
    }

    /// Apply the worker's reply. Returns the history entry to persist when
    /// a download job was created.
    pub fn finish_download(
        &mut self,
        ticket: &DownloadTicket,
        outcome: Result<DownloadReply, AppError>,
    ) -> Option<HistoryItem> {
        let current = self.active_download == Some(ticket.seq);

        let result = match outcome {
            Ok(reply) => reply.into_result(),
            Err(e) => Err(format!("Error: {}", e)),
        };

        match result {
            Ok(download_id) => {
                tracing::info!(?download_id, title = %ticket.title, "download accepted");
                if current {
                    self.progress = DownloadProgress {
                        phase: DownloadPhase::Completed,
                        percent: 100.0,
                    };
                }
                self.notify("Download started!");
                Some(HistoryItem::record(
                    &ticket.title,
                    ticket.thumbnail.as_deref(),
                    &ticket.format,
                ))
            }
            Err(message) => {
                tracing::warn!(error = %message, "download failed");
                if current {
                    self.active_download = None;
                    self.progress = DownloadProgress::IDLE;
                }
                self.notify(message);
                None
            }
        }
    }

    /// Delay after a completed download has elapsed.
    pub fn completion_elapsed(&mut self, seq: u64) {
        if self.active_download == Some(seq) && self.progress.phase == DownloadPhase::Completed {
            self.active_download = None;
            self.progress = DownloadProgress::IDLE;
        }
    }

    pub fn history_loaded(&mut self, outcome: Result<Vec<HistoryItem>, AppError>) {
        match outcome {
            Ok(items) => self.history = items,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history");
                self.notify(format!("Error: {}", e));
            }
        }
    }

    pub fn history_saved(&mut self, outcome: Result<Vec<HistoryItem>, AppError>) {
        match outcome {
            Ok(items) => self.history = items,
            Err(e) => {
                tracing::warn!(error = %e, "failed to save history");
                self.notify(format!("Error: {}", e));
            }
        }
    }

    pub fn history_cleared(&mut self, outcome: Result<(), AppError>) {
        match outcome {
            Ok(()) => {
                self.history.clear();
                self.notify("History cleared");
            }
            Err(e) => self.notify(format!("Error: {}", e)),
        }
    }

    pub fn dismiss_notification(&mut self, id: u64) {
        if self.notification.as_ref().is_some_and(|n| n.id == id) {
            self.notification = None;
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.notification_seq += 1;
        self.notification = Some(Notification {
            id: self.notification_seq,
            text: text.into(),
        });
    }
}

/// Analyze effect: harvest cookies for the page, then call the server.
pub async fn run_analysis(
    client: ApiClient,
    harvester: CookieHarvester,
    ticket: AnalyzeTicket,
) -> Result<VideoAnalysis, AppError> {
    let cookies = harvester.cookies_for(&ticket.url).await;
    client
        .analyze(&ticket.url, &cookies)
        .await
        .map_err(AppError::from)
}

/// First half of the download effect.
pub async fn harvest_download_cookies(harvester: CookieHarvester, ticket: &DownloadTicket) -> Vec<Cookie> {
    harvester.cookies_for(&ticket.page_url).await
}

/// Second half: hand the request to the background worker and wait for its
/// single reply.
pub async fn send_download_request(
    sender: MessageSender,
    ticket: &DownloadTicket,
    cookies: Vec<Cookie>,
    user_agent: Option<String>,
) -> Result<DownloadReply, AppError> {
    sender
        .request_download(ticket.to_request(cookies, user_agent))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quality;
    use serde_json::json;

    fn controller() -> PopupController {
        PopupController::new(PopupConfig::default())
    }

    fn demo() -> VideoAnalysis {
        serde_json::from_value(json!({
            "title": "Demo",
            "webpage_url": "https://youtu.be/abc123",
            "formats": [
                {"id": "1", "type": "video", "quality": "1080p", "height": 1080, "size_text": "50MB"},
                {"id": "2", "type": "audio", "quality": "128kbps", "size_text": "5MB"}
            ]
        }))
        .unwrap()
    }

    fn titled(title: &str) -> VideoAnalysis {
        VideoAnalysis {
            title: title.to_string(),
            ..demo()
        }
    }

    fn in_result() -> PopupController {
        let mut c = controller();
        c.set_url_input("https://youtu.be/abc123".into());
        let ticket = c.begin_analyze().unwrap();
        assert!(c.finish_analyze(ticket.seq, Ok(demo())));
        c
    }

    #[test]
    fn empty_input_is_rejected_without_state_change() {
        let mut c = controller();
        c.set_url_input("   ".into());
        assert!(c.begin_analyze().is_none());
        assert_eq!(c.state(), PopupState::Input);
        assert_eq!(c.notification().unwrap().text, "Please paste a video URL");
    }

    #[test]
    fn demo_scenario_selects_first_video() {
        let c = in_result();
        assert_eq!(c.state(), PopupState::Result);
        let session = c.session().unwrap();
        assert_eq!(session.analysis().title, "Demo");
        let selected = c.selected_format().unwrap();
        assert_eq!(selected.id, "1");
        assert_eq!(selected.badge(), "1080p");
    }

    #[test]
    fn first_video_is_default_even_after_audio() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/x".into());
        let ticket = c.begin_analyze().unwrap();
        let analysis: VideoAnalysis = serde_json::from_value(json!({
            "title": "t",
            "formats": [
                {"id": "a", "type": "audio", "quality": "128kbps", "size_text": "1MB"},
                {"id": "v1", "type": "video", "quality": "720p", "height": 720, "size_text": "9MB"},
                {"id": "v2", "type": "video", "quality": "480p", "height": 480, "size_text": "5MB"}
            ]
        }))
        .unwrap();
        c.finish_analyze(ticket.seq, Ok(analysis));
        assert_eq!(c.selected_format().unwrap().id, "v1");
    }

    #[test]
    fn audio_only_analysis_selects_audio() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/x".into());
        let ticket = c.begin_analyze().unwrap();
        let analysis: VideoAnalysis = serde_json::from_value(json!({
            "title": "t",
            "formats": [{"id": "bestaudio", "type": "audio", "quality": "128kbps", "size_text": "1MB"}]
        }))
        .unwrap();
        c.finish_analyze(ticket.seq, Ok(analysis));
        assert_eq!(c.selected_format().unwrap().badge(), "MP3");
    }

    #[test]
    fn analyze_failure_reverts_to_input() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/abc123".into());
        let ticket = c.begin_analyze().unwrap();
        assert_eq!(c.state(), PopupState::Loading);

        assert!(c.finish_analyze(ticket.seq, Err(AppError::Api("geo blocked".into()))));
        assert_eq!(c.state(), PopupState::Input);
        assert!(c.session().is_none());
        assert_eq!(
            c.notification().unwrap().text,
            "Analysis failed. Check your connection."
        );
    }

    #[test]
    fn stale_analysis_arriving_late_is_ignored() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/a".into());
        let a = c.begin_analyze().unwrap();
        c.set_url_input("https://youtu.be/b".into());
        let b = c.begin_analyze().unwrap();

        assert!(c.finish_analyze(b.seq, Ok(titled("B"))));
        assert!(!c.finish_analyze(a.seq, Ok(titled("A"))));
        assert_eq!(c.session().unwrap().analysis().title, "B");
        assert_eq!(c.state(), PopupState::Result);
    }

    #[test]
    fn stale_analysis_arriving_early_is_ignored() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/a".into());
        let a = c.begin_analyze().unwrap();
        let b = c.begin_analyze().unwrap();

        assert!(!c.finish_analyze(a.seq, Err(AppError::Api("late".into()))));
        assert_eq!(c.state(), PopupState::Loading);
        assert!(c.finish_analyze(b.seq, Ok(titled("B"))));
        assert_eq!(c.session().unwrap().analysis().title, "B");
    }

    #[test]
    fn back_from_loading_abandons_analysis() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/a".into());
        let a = c.begin_analyze().unwrap();
        c.back();
        assert_eq!(c.state(), PopupState::Input);
        assert!(!c.finish_analyze(a.seq, Ok(demo())));
        assert!(c.session().is_none());
    }

    #[test]
    fn format_selection_validates_ids() {
        let mut c = in_result();
        c.select_format("2").unwrap();
        assert_eq!(c.selected_format().unwrap().badge(), "MP3");
        assert_eq!(c.selected_format().unwrap().size_text, "5MB");

        assert_eq!(
            c.select_format("999"),
            Err(AppError::UnknownFormat("999".into()))
        );
        assert_eq!(c.selected_format().unwrap().id, "2");
        assert_eq!(c.state(), PopupState::Result);
    }

    #[test]
    fn history_returns_to_previous_state() {
        let mut c = in_result();
        assert!(c.show_history());
        assert_eq!(c.state(), PopupState::History);
        c.leave_history();
        assert_eq!(c.state(), PopupState::Result);

        c.reset();
        assert_eq!(c.state(), PopupState::Input);
        assert!(c.session().is_none());
        assert!(c.url_input().is_empty());

        assert!(c.show_history());
        c.back();
        assert_eq!(c.state(), PopupState::Input);
    }

    #[test]
    fn history_is_unreachable_while_loading() {
        let mut c = controller();
        c.set_url_input("https://youtu.be/a".into());
        c.begin_analyze().unwrap();
        assert!(!c.show_history());
        assert_eq!(c.state(), PopupState::Loading);
    }

    #[test]
    fn download_success_completes_then_resets() {
        let mut c = in_result();
        let ticket = c.begin_download().unwrap();
        assert_eq!(c.progress().phase, DownloadPhase::Preparing);
        assert!(c.begin_download().is_none());

        c.download_requested(ticket.seq);
        assert_eq!(c.progress().phase, DownloadPhase::Downloading);

        let item = c
            .finish_download(&ticket, Ok(DownloadReply::accepted(3)))
            .unwrap();
        assert_eq!(item.title, "Demo");
        assert_eq!(item.quality, "1080p");
        assert_eq!(item.kind, FormatKind::Video);
        assert_eq!(c.progress().percent, 100.0);
        assert_eq!(c.progress().phase, DownloadPhase::Completed);
        assert_eq!(c.notification().unwrap().text, "Download started!");

        c.completion_elapsed(ticket.seq);
        assert_eq!(c.progress().percent, 0.0);
        assert!(!c.download_panel_visible());
    }

    #[test]
    fn missing_token_reply_resets_progress() {
        let mut c = in_result();
        let ticket = c.begin_download().unwrap();
        for _ in 0..5 {
            c.tick_progress();
        }
        assert!(c.progress().percent > 0.0);

        let item = c.finish_download(
            &ticket,
            Ok(DownloadReply::failed("No download token received from server")),
        );
        assert!(item.is_none());
        assert_eq!(c.progress().percent, 0.0);
        assert_eq!(c.progress().phase, DownloadPhase::Idle);
        assert_eq!(
            c.notification().unwrap().text,
            "No download token received from server"
        );
        // Retryable from the same state
        assert!(c.begin_download().is_some());
    }

    #[test]
    fn channel_failure_is_reported() {
        let mut c = in_result();
        let ticket = c.begin_download().unwrap();
        assert!(c.finish_download(&ticket, Err(AppError::ChannelClosed)).is_none());
        assert!(c.notification().unwrap().text.starts_with("Error: "));
        assert!(!c.is_downloading());
    }

    #[test]
    fn progress_never_reaches_completion_on_its_own() {
        let mut c = in_result();
        c.begin_download().unwrap();
        let mut last = 0.0;
        for _ in 0..500 {
            c.tick_progress();
            assert!(c.progress().percent >= last);
            last = c.progress().percent;
        }
        assert_eq!(last, PopupConfig::default().progress_cap);
        assert!(last < 100.0);
    }

    #[test]
    fn configured_full_cap_still_stops_short_of_completion() {
        let mut c = PopupController::new(PopupConfig {
            progress_cap: 100.0,
            ..PopupConfig::default()
        });
        c.set_url_input("https://youtu.be/abc123".into());
        let ticket = c.begin_analyze().unwrap();
        c.finish_analyze(ticket.seq, Ok(demo()));
        c.begin_download().unwrap();

        for _ in 0..500 {
            c.tick_progress();
        }
        assert!(c.progress().percent < 100.0);
        assert_eq!(c.progress().phase, DownloadPhase::Preparing);
    }

    #[test]
    fn superseded_download_still_records_history() {
        let mut c = in_result();
        let ticket = c.begin_download().unwrap();
        c.reset();

        let item = c.finish_download(&ticket, Ok(DownloadReply::accepted(1)));
        assert!(item.is_some());
        assert_eq!(c.progress().phase, DownloadPhase::Idle);
    }

    #[test]
    fn download_request_carries_selection() {
        let mut c = in_result();
        c.select_format("2").unwrap();
        let ticket = c.begin_download().unwrap();
        let request = ticket.to_request(vec![], Some("ua".into()));
        assert_eq!(request.url, "https://youtu.be/abc123");
        assert_eq!(request.format_type, FormatKind::Audio);
        assert_eq!(request.quality, Quality::Label("2".into()));
        assert_eq!(request.format_id, "2");
        assert_eq!(request.user_agent.as_deref(), Some("ua"));
    }

    #[test]
    fn notifications_dismiss_by_id() {
        let mut c = controller();
        c.begin_analyze();
        let first = c.notification().unwrap().id;
        c.begin_analyze();
        let second = c.notification().unwrap().id;
        assert_ne!(first, second);

        c.dismiss_notification(first);
        assert!(c.notification().is_some());
        c.dismiss_notification(second);
        assert!(c.notification().is_none());
    }

    #[test]
    fn tab_suggestion_only_for_video_pages() {
        let mut c = controller();
        assert!(!c.suggest_from_tab("https://www.tiktok.com/explore"));
        assert!(c.url_input().is_empty());
        assert!(c.suggest_from_tab("https://www.youtube.com/watch?v=abc"));
        assert_eq!(c.url_input(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn clearing_history_notifies() {
        let mut c = controller();
        c.history_cleared(Ok(()));
        assert!(c.history().is_empty());
        assert_eq!(c.notification().unwrap().text, "History cleared");
    }
}
