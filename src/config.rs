//! Configuration loaded from `<config_dir>/takevid/config.json`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ApiConfig;
use crate::domain::AppError;

const APP_DIR: &str = "takevid";
const MAX_PROGRESS_CAP: f32 = 99.0;

/// Timings of the popup's cosmetic feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    pub progress_tick_ms: u64,
    /// Percentage the indicator creeps toward while waiting for a reply.
    pub progress_cap: f32,
    /// How long the finished indicator stays at 100% before resetting.
    pub completion_reset_ms: u64,
    pub notification_ms: u64,
}

impl PopupConfig {
    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(50))
    }

    /// `progress_cap` kept strictly below completion.
    pub fn progress_ceiling(&self) -> f32 {
        if self.progress_cap.is_finite() {
            self.progress_cap.clamp(0.0, MAX_PROGRESS_CAP)
        } else {
            MAX_PROGRESS_CAP
        }
    }

    pub fn completion_reset(&self) -> Duration {
        Duration::from_millis(self.completion_reset_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            progress_tick_ms: 800,
            progress_cap: 95.0,
            completion_reset_ms: 2000,
            notification_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ApiConfig,
    pub popup: PopupConfig,
    /// Where accepted downloads are written. Defaults to the user's
    /// download directory.
    pub download_dir: Option<PathBuf>,
    /// Exported browser cookies (JSON array). No cookies are sent when unset.
    pub cookie_jar: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
    }

    /// Load the config file; a missing file yields defaults.
    pub fn load() -> Result<Self, AppError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, AppError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(AppError::Io(format!("{}: {}", path.display(), e))),
        };
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Io(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("history.json")
        })
    }
}
