use iced::{
    widget::{button, column, progress_bar, row, scrollable, text, text_input, Column, Space},
    Element, Length,
};

use crate::application::popup::{PopupController, PopupState};
use crate::domain::{Format, HistoryItem};
use crate::utils::format_duration;

#[derive(Debug, Clone)]
pub enum PopupMessage {
    UrlChanged(String),
    AnalyzePressed,
    FormatSelected(String),
    DownloadPressed,
    ResetPressed,
    HistoryPressed,
    HistoryBackPressed,
    BackPressed,
    ClearHistoryPressed,
}

pub fn view(popup: &PopupController) -> Element<'_, PopupMessage> {
    let mut header = row![text("TakeVid").size(28), Space::new().width(Length::Fill)].spacing(10);
    if matches!(popup.state(), PopupState::Input | PopupState::Result) {
        header = header.push(button("History").on_press(PopupMessage::HistoryPressed));
    }
    if popup.state() != PopupState::Input {
        header = header.push(button("Back").on_press(PopupMessage::BackPressed));
    }

    let body = match popup.state() {
        PopupState::Input => input_view(popup),
        PopupState::Loading => loading_view(),
        PopupState::Result => result_view(popup),
        PopupState::History => history_view(popup.history()),
    };

    let mut content = column![header, body].padding(20).spacing(16);
    if let Some(notification) = popup.notification() {
        content = content.push(text(&notification.text).size(14));
    }
    content.into()
}

fn input_view(popup: &PopupController) -> Element<'_, PopupMessage> {
    column![
        text("Video URL:").size(16),
        text_input("Paste a video link...", popup.url_input())
            .on_input(PopupMessage::UrlChanged)
            .on_submit(PopupMessage::AnalyzePressed)
            .padding(10),
        Space::new().height(Length::Fixed(10.0)),
        button("Analyze")
            .on_press(PopupMessage::AnalyzePressed)
            .padding([10, 20]),
    ]
    .spacing(10)
    .into()
}

fn loading_view<'a>() -> Element<'a, PopupMessage> {
    column![text("Analyzing video...").size(18)].into()
}

fn option_button(format: &Format, selected: bool) -> Element<'_, PopupMessage> {
    let marker = if selected { "● " } else { "○ " };
    button(
        row![
            text(format!("{}{}", marker, format.option_label())),
            Space::new().width(Length::Fill),
            text(&format.size_text),
        ]
        .spacing(10),
    )
    .width(Length::Fill)
    .on_press(PopupMessage::FormatSelected(format.id.clone()))
    .into()
}

fn result_view(popup: &PopupController) -> Element<'_, PopupMessage> {
    let Some(session) = popup.session() else {
        return input_view(popup);
    };
    let analysis = session.analysis();
    let selected_id = popup.selected_format().map(|f| f.id.as_str());

    let mut options = Column::new().spacing(6).push(text("Video").size(14));
    for format in analysis.video_formats() {
        options = options.push(option_button(format, selected_id == Some(format.id.as_str())));
    }
    if let Some(audio) = analysis.audio_format() {
        options = options
            .push(text("Audio").size(14))
            .push(option_button(audio, selected_id == Some(audio.id.as_str())));
    }

    let selection: Element<'_, PopupMessage> = match popup.selected_format() {
        Some(format) => row![
            text(format.badge()).size(16),
            Space::new().width(Length::Fill),
            text(&format.size_text).size(14),
        ]
        .into(),
        None => text("No format available").size(14).into(),
    };

    let action: Element<'_, PopupMessage> = if popup.download_panel_visible() {
        let progress = popup.progress();
        column![
            row![
                text(progress.phase.label()).size(14),
                Space::new().width(Length::Fill),
                text(format!("{}%", progress.percent.round() as u32)).size(14),
            ],
            progress_bar(0.0..=100.0, progress.percent),
        ]
        .spacing(6)
        .into()
    } else {
        button("Download")
            .on_press_maybe(popup.selected_format().map(|_| PopupMessage::DownloadPressed))
            .padding([10, 20])
            .into()
    };

    column![
        text(&analysis.title).size(20),
        text(analysis.uploader_label()).size(14),
        text(format_duration(analysis.duration)).size(14),
        scrollable(options).height(Length::Fixed(220.0)),
        selection,
        action,
        button("Analyze another").on_press(PopupMessage::ResetPressed),
    ]
    .spacing(10)
    .into()
}

fn history_view(items: &[HistoryItem]) -> Element<'_, PopupMessage> {
    let mut list = Column::new().spacing(8);
    if items.is_empty() {
        list = list.push(text("No downloads yet.").size(14));
    }
    for item in items {
        list = list.push(
            column![
                text(&item.title).size(15),
                text(format!("{} • {}", item.quality, item.date)).size(12),
            ]
            .spacing(2),
        );
    }

    column![
        row![
            button("Back").on_press(PopupMessage::HistoryBackPressed),
            Space::new().width(Length::Fill),
            button("Clear history").on_press(PopupMessage::ClearHistoryPressed),
        ],
        scrollable(list).height(Length::Fill),
    ]
    .spacing(12)
    .into()
}
