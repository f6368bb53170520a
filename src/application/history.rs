use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{AppError, HistoryItem};

pub const HISTORY_LIMIT: usize = 10;

/// On-disk document: a single `downloadHistory` key.
#[derive(Debug, Default, Deserialize, Serialize)]
struct StoredHistory {
    #[serde(rename = "downloadHistory", default)]
    download_history: Vec<HistoryItem>,
}

/// Most-recent-first log of started downloads, capped at [`HISTORY_LIMIT`].
///
/// Mutations are read-modify-write cycles serialized through one guard, and
/// each persist replaces the whole file via rename so readers never see a
/// partial list. Clones share the guard.
#[derive(Clone)]
pub struct HistoryStore {
    path: PathBuf,
    write_guard: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn all(&self) -> Result<Vec<HistoryItem>, AppError> {
        self.load().await
    }

    /// Prepend `item` and return the list as persisted.
    pub async fn append(&self, item: HistoryItem) -> Result<Vec<HistoryItem>, AppError> {
        let _guard = self.write_guard.lock().await;

        let mut items = self.load().await?;
        items.insert(0, item);
        items.truncate(HISTORY_LIMIT);
        self.persist(&items).await?;

        Ok(items)
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        let _guard = self.write_guard.lock().await;
        self.persist(&[]).await
    }

    async fn load(&self) -> Result<Vec<HistoryItem>, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };

        match serde_json::from_str::<StoredHistory>(&raw) {
            Ok(stored) => Ok(stored.download_history),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable history, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn persist(&self, items: &[HistoryItem]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let doc = serde_json::to_vec_pretty(&StoredHistory {
            download_history: items.to_vec(),
        })
        .map_err(|e| AppError::Io(format!("failed to encode history: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &doc)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        tracing::debug!(count = items.len(), "history persisted");
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        AppError::Permission(path.display().to_string())
    } else {
        AppError::Io(format!("{}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FormatKind;

    fn item(n: u64) -> HistoryItem {
        HistoryItem {
            id: n,
            title: format!("video {}", n),
            thumbnail: None,
            quality: "720p".into(),
            kind: FormatKind::Video,
            date: "1/1/2026".into(),
            timestamp: n,
        }
    }

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let (_dir, store) = store();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keeps_ten_most_recent_first() {
        let (_dir, store) = store();
        for n in 1..=13 {
            store.append(item(n)).await.unwrap();
        }

        let items = store.all().await.unwrap();
        assert_eq!(items.len(), HISTORY_LIMIT);
        let ids: Vec<u64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, (4..=13).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn fewer_than_limit_are_all_kept() {
        let (_dir, store) = store();
        for n in 1..=3 {
            store.append(item(n)).await.unwrap();
        }
        let ids: Vec<u64> = store.all().await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn clear_empties_and_is_idempotent() {
        let (_dir, store) = store();
        store.clear().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());

        for n in 1..=5 {
            store.append(item(n)).await.unwrap();
        }
        store.clear().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
        store.clear().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persisted_under_download_history_key() {
        let (_dir, store) = store();
        store.append(item(1)).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["downloadHistory"][0]["type"], "video");
        assert_eq!(value["downloadHistory"][0]["title"], "video 1");
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let (_dir, store) = store();
        let tasks: Vec<_> = (1..=8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.append(item(n)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.all().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{not json").unwrap();

        assert!(store.all().await.unwrap().is_empty());
        store.append(item(1)).await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 1);
    }
}
