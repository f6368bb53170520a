use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

/// Get current Unix timestamp in milliseconds
pub fn get_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Short local date, e.g. `3/7/2026`
pub fn local_date_label() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

/// Seconds to `M:SS`
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s > 0.0 => {
            let total = s.floor() as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        _ => "0:00".to_string(),
    }
}

fn video_page_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(youtube\.com/watch|youtu\.be/|tiktok\.com.*/(video|v)/)")
            .expect("static regex")
    })
}

/// Whether a tab URL points directly at a single video page.
pub fn is_video_page_url(url: &str) -> bool {
    video_page_regex().is_match(url) && !url.contains("/search") && !url.contains("/explore")
}

/// Pick a path in `dir` for `filename` that does not exist yet, using the
/// browser convention `name (1).ext`, `name (2).ext`, ...
pub fn uniquify_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    };

    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let ts = get_timestamp_millis();
        assert!(ts > 1_700_000_000_000); // Sanity check
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test/file.mp3"), "test_file.mp3");
        assert_eq!(sanitize_filename("normal-name.mp3"), "normal-name.mp3");
        assert_eq!(sanitize_filename(" .hidden. "), "hidden");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "0:00");
        assert_eq!(format_duration(Some(0.0)), "0:00");
        assert_eq!(format_duration(Some(65.7)), "1:05");
        assert_eq!(format_duration(Some(3600.0)), "60:00");
    }

    #[test]
    fn test_video_page_detection() {
        assert!(is_video_page_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_video_page_url("https://youtu.be/abc123"));
        assert!(is_video_page_url("https://www.tiktok.com/@user/video/7300000000"));
        assert!(!is_video_page_url("https://www.tiktok.com/explore"));
        assert!(!is_video_page_url("https://www.youtube.com/"));
        assert!(!is_video_page_url("https://example.com/watch"));
    }

    #[test]
    fn test_uniquify_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = uniquify_path(dir.path(), "clip.mp4");
        assert_eq!(first, dir.path().join("clip.mp4"));

        std::fs::write(&first, b"x").unwrap();
        let second = uniquify_path(dir.path(), "clip.mp4");
        assert_eq!(second, dir.path().join("clip (1).mp4"));

        std::fs::write(&second, b"x").unwrap();
        assert_eq!(uniquify_path(dir.path(), "clip.mp4"), dir.path().join("clip (2).mp4"));
    }
}
