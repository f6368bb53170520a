use serde::{Deserialize, Deserializer, Serialize};

/// The server fills its reply from optional extractor fields, so absent
/// values can arrive as explicit `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Byte counts may be estimates sent as floats.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let size = Option::<f64>::deserialize(deserializer)?;
    Ok(size
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.round() as u64))
}

/// Result of a successful `/analyze` call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub webpage_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<Format>,
}

impl VideoAnalysis {
    pub fn uploader_label(&self) -> &str {
        match self.uploader.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Unknown Creator",
        }
    }

    pub fn video_formats(&self) -> impl Iterator<Item = &Format> {
        self.formats.iter().filter(|f| f.kind == FormatKind::Video)
    }

    /// The single audio option offered next to the video list.
    pub fn audio_format(&self) -> Option<&Format> {
        self.formats.iter().find(|f| f.kind == FormatKind::Audio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Video,
    Audio,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Video => "video",
            FormatKind::Audio => "audio",
        }
    }
}

/// One selectable audio/video variant.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Format {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quality: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size_text: String,
}

impl Format {
    /// Label shown in the option list.
    pub fn option_label(&self) -> String {
        match self.kind {
            FormatKind::Audio => "MP3 Audio".to_string(),
            FormatKind::Video => match self.height {
                Some(h) if h >= 1080 => {
                    let tag = if self.quality.contains("2160") { "4K" } else { "HD" };
                    format!("{} {}", self.quality, tag)
                }
                _ => self.quality.clone(),
            },
        }
    }

    /// Badge shown next to the download button for the selected format.
    pub fn badge(&self) -> &str {
        match self.kind {
            FormatKind::Audio => "MP3",
            FormatKind::Video => &self.quality,
        }
    }

    /// Value sent as `quality` in a download request: the height when
    /// known, the format id otherwise.
    pub fn request_quality(&self) -> Quality {
        match self.height {
            Some(h) if h > 0 => Quality::Height(h),
            _ => Quality::Label(self.id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Quality {
    Height(u32),
    Label(String),
}

/// Browser-format cookie snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

impl Cookie {
    /// Whether a `getAll({ domain: host })` query would return this cookie.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        !domain.is_empty()
            && (domain == host
                || (domain.len() > host.len()
                    && domain.ends_with(&host)
                    && domain.as_bytes()[domain.len() - host.len() - 1] == b'.'))
    }
}

/// Payload of the `download` message sent from the popup to the
/// background worker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(rename = "format")]
    pub format_type: FormatKind,
    pub quality: Quality,
    pub format_id: String,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(rename = "userAgent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Opaque single-use handle issued by `/prepare_download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadToken(String);

impl DownloadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier assigned by the download manager to an accepted job.
pub type DownloadId = u64;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryItem {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub quality: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
    pub date: String,
    pub timestamp: u64,
}

impl HistoryItem {
    pub fn record(title: &str, thumbnail: Option<&str>, format: &Format) -> Self {
        let timestamp = crate::utils::get_timestamp_millis();
        Self {
            id: timestamp,
            title: title.to_string(),
            thumbnail: thumbnail.map(str::to_string),
            quality: format.quality.clone(),
            kind: format.kind,
            date: crate::utils::local_date_label(),
            timestamp,
        }
    }
}

/// Status line of the download sub-flow inside the result view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Preparing,
    Downloading,
    Completed,
}

impl DownloadPhase {
    pub fn label(&self) -> &'static str {
        match self {
            DownloadPhase::Idle => "",
            DownloadPhase::Preparing => "Preparing...",
            DownloadPhase::Downloading => "Downloading...",
            DownloadPhase::Completed => "Completed!",
        }
    }
}
