use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tracing::debug;

use crate::dao::{
    StatsStore,
    models::StatsDocument,
    storage::{StorageError, StorageResult},
};

/// Stores the statistics document as pretty-printed JSON on the local filesystem.
#[derive(Clone)]
pub struct JsonFileStatsStore {
    path: Arc<PathBuf>,
}

impl JsonFileStatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }
}

impl StatsStore for JsonFileStatsStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<StatsDocument>> {
        let path = self.path.clone();
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(path.as_ref()).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "no statistics file yet");
                    return Ok(StatsDocument {
                        version: 1,
                        ..StatsDocument::default()
                    });
                }
                Err(err) => {
                    return Err(StorageError::unavailable("read", &path, err));
                }
            };

            serde_json::from_str(&contents).map_err(|err| StorageError::corrupt(&path, err))
        })
    }

    fn save(&self, document: StatsDocument) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| StorageError::unavailable("create", parent, err))?;
            }

            let payload = serde_json::to_vec_pretty(&document)
                .map_err(|err| StorageError::corrupt(&path, err))?;

            tokio::fs::write(path.as_ref(), payload)
                .await
                .map_err(|err| StorageError::unavailable("write", &path, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AllTimeStats;

    #[tokio::test]
    async fn missing_file_loads_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatsStore::new(dir.path().join("stats.json"));

        let doc = store.load().await.unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.games.is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatsStore::new(dir.path().join("nested/stats.json"));
        let doc = StatsDocument {
            version: 1,
            all_time: AllTimeStats {
                games_played: 3,
                highest_avg_score: 7.5,
                highest_avg_game_id: Some("abcd1234".into()),
            },
            ..StatsDocument::default()
        };

        store.save(doc.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStatsStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
