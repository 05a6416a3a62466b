//! File stager
//!
//! Publishes a selected entry's media into the engine's watched directory,
//! verifies it becomes visible in the engine catalog, and garbage-collects
//! stale staged files. Staged names combine the contributing player's id
//! with the source basename, so two players staging the same song never
//! collide and re-staging the same entry replaces the previous file.

use crate::engine::Catalog;
use crate::error::Result;
use crewcast_common::db::Entry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub struct FileStager {
    media_root: PathBuf,
    queue_dir: PathBuf,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl FileStager {
    pub fn new(
        media_root: PathBuf,
        queue_dir: PathBuf,
        confirm_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            media_root,
            queue_dir,
            confirm_timeout,
            poll_interval,
        }
    }

    /// Staged filename for an entry contributed by `player_id`
    pub fn staged_name(player_id: i64, song_path: &str) -> String {
        let basename = Path::new(song_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| song_path.to_string());
        format!("{player_id}-{basename}")
    }

    /// Copy or link the entry's media into the watched directory.
    ///
    /// A hard link is attempted first (no duplication when source and
    /// destination share a filesystem); any link failure falls back to a
    /// full copy. An existing staged file is unlinked first so a retry
    /// never leaves two files for one entry.
    pub async fn stage(&self, entry: &Entry, player_id: i64) -> Result<String> {
        let source = self.media_root.join(&entry.song_path);
        let staged_name = Self::staged_name(player_id, &entry.song_path);
        let dest = self.queue_dir.join(&staged_name);
        debug!("staging to {}", staged_name);

        if let Err(e) = tokio::fs::remove_file(&dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        if tokio::fs::hard_link(&source, &dest).await.is_err() {
            tokio::fs::copy(&source, &dest).await?;
        }

        Ok(staged_name)
    }

    /// Poll the engine catalog until `staged_name` appears or the timeout
    /// elapses. On timeout the caller must treat the entry as lost.
    pub async fn confirm<C: Catalog>(&self, catalog: &C, staged_name: &str) -> bool {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            if let Err(e) = catalog.refresh().await {
                warn!("catalog refresh failed while confirming {}: {}", staged_name, e);
            }
            match catalog.files().await {
                Ok(files) => {
                    if files.iter().any(|f| f == staged_name) {
                        return true;
                    }
                }
                Err(e) => warn!("catalog list failed while confirming {}: {}", staged_name, e),
            }

            if Instant::now() > deadline {
                error!("{} never made it to the catalog", staged_name);
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Remove a staged file that will not be played after all
    pub async fn discard(&self, staged_name: &str) {
        let path = self.queue_dir.join(staged_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not discard staged file {}: {}", staged_name, e);
            }
        }
    }

    /// Delete every staged file not named in `keep` (the engine's current
    /// playlist). This is the sole eviction mechanism for the staging
    /// directory; it runs after every successful playlist mutation.
    pub async fn purge_unused(&self, keep: &[String]) -> Result<Vec<String>> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let mut removed = Vec::new();

        let mut dir = tokio::fs::read_dir(&self.queue_dir).await?;
        while let Some(dirent) = dir.next_entry().await? {
            if !dirent.file_type().await?.is_file() {
                continue;
            }
            let name = dirent.file_name().to_string_lossy().into_owned();
            if keep.contains(name.as_str()) {
                continue;
            }
            tokio::fs::remove_file(dirent.path()).await?;
            removed.push(name);
        }

        if !removed.is_empty() {
            debug!("purged {} unused staged files", removed.len());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn entry(song_path: &str) -> Entry {
        Entry {
            id: 1,
            queue_id: 1,
            station_id: 1,
            place: 0,
            song_path: song_path.to_string(),
            artist: "Spoon".into(),
            title: "New York Kiss".into(),
            album: None,
            filetype: "mp3".into(),
        }
    }

    fn stager(media_root: &Path, queue_dir: &Path) -> FileStager {
        FileStager::new(
            media_root.to_path_buf(),
            queue_dir.to_path_buf(),
            Duration::from_millis(200),
            Duration::from_millis(50),
        )
    }

    /// Catalog double: refresh copies the pending file list into view
    struct FakeCatalog {
        pending: Mutex<Vec<String>>,
        visible: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn with_pending(files: Vec<String>) -> Self {
            Self {
                pending: Mutex::new(files),
                visible: Mutex::new(Vec::new()),
            }
        }
    }

    impl Catalog for FakeCatalog {
        async fn refresh(&self) -> Result<()> {
            let pending = self.pending.lock().unwrap().clone();
            *self.visible.lock().unwrap() = pending;
            Ok(())
        }

        async fn files(&self) -> Result<Vec<String>> {
            Ok(self.visible.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn test_stage_links_into_queue_dir() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        std::fs::create_dir(media.path().join("songs")).unwrap();
        std::fs::write(media.path().join("songs/abc.mp3"), b"audio").unwrap();

        let stager = stager(media.path(), queue.path());
        let name = stager.stage(&entry("songs/abc.mp3"), 7).await.unwrap();

        assert_eq!(name, "7-abc.mp3");
        assert_eq!(std::fs::read(queue.path().join(&name)).unwrap(), b"audio");
    }

    #[tokio::test]
    async fn test_stage_twice_leaves_one_file() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        std::fs::create_dir(media.path().join("songs")).unwrap();
        std::fs::write(media.path().join("songs/abc.mp3"), b"audio").unwrap();

        let stager = stager(media.path(), queue.path());
        let first = stager.stage(&entry("songs/abc.mp3"), 7).await.unwrap();
        let second = stager.stage(&entry("songs/abc.mp3"), 7).await.unwrap();
        assert_eq!(first, second);

        let count = std::fs::read_dir(queue.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_confirm_sees_file_after_refresh() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        let stager = stager(media.path(), queue.path());

        let catalog = FakeCatalog::with_pending(vec!["7-abc.mp3".to_string()]);
        assert!(stager.confirm(&catalog, "7-abc.mp3").await);
    }

    #[tokio::test]
    async fn test_confirm_times_out_when_file_never_arrives() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        let stager = stager(media.path(), queue.path());

        let catalog = FakeCatalog::with_pending(Vec::new());
        assert!(!stager.confirm(&catalog, "7-abc.mp3").await);
    }

    #[tokio::test]
    async fn test_purge_removes_exactly_the_unreferenced() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        for name in ["1-keep.mp3", "2-stale.mp3", "3-stale.mp3"] {
            std::fs::write(queue.path().join(name), b"x").unwrap();
        }

        let stager = stager(media.path(), queue.path());
        let mut removed = stager
            .purge_unused(&["1-keep.mp3".to_string()])
            .await
            .unwrap();
        removed.sort();

        assert_eq!(removed, vec!["2-stale.mp3", "3-stale.mp3"]);
        assert!(queue.path().join("1-keep.mp3").exists());
        assert!(!queue.path().join("2-stale.mp3").exists());
    }

    #[tokio::test]
    async fn test_purge_with_everything_referenced_removes_nothing() {
        let media = tempfile::tempdir().unwrap();
        let queue = tempfile::tempdir().unwrap();
        std::fs::write(queue.path().join("1-keep.mp3"), b"x").unwrap();

        let stager = stager(media.path(), queue.path());
        let removed = stager
            .purge_unused(&["1-keep.mp3".to_string()])
            .await
            .unwrap();
        assert!(removed.is_empty());
    }
}
