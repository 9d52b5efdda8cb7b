//! File system utils.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::watch;

pub struct FsHandler;

impl FsHandler {
    /// Create a directory and its parents if it doesn't exist.
    pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Directory ready");
        Ok(())
    }

    /// Remove a file left over by a previous run, so a later [`FsHandler::wait_for_file`]
    /// only sees the new one.
    pub fn remove_stale(path: &Path) -> anyhow::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed stale file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Wait for a file to be created with a timeout.
    ///
    /// Watches the parent directory, so the parent must exist.
    pub async fn wait_for_file(path: &Path, timeout: Duration) -> anyhow::Result<()> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "File already exists");
            return Ok(());
        }

        tracing::debug!(path = %path.display(), "Waiting for file");

        let parent = path
            .parent()
            .context("File path must have a parent directory")?;

        let (tx, mut rx) = watch::channel(None);

        let path_watcher: PathBuf = path.to_path_buf();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event)
                    if (event.kind.is_create() || event.kind.is_modify())
                        && event.paths.contains(&path_watcher) =>
                {
                    tracing::debug!(event = ?event, path = %path_watcher.display(), "File detected");

                    if let Err(e) = tx.send(Some(event.clone())) {
                        tracing::error!(err = ?e, path = %path_watcher.display(), "Failed to send event to channel");
                    }
                }
                Ok(event) => {
                    tracing::trace!(event = ?event, path = %path_watcher.display(), "Ignored event emitted by file watcher");
                }
                Err(e) => {
                    tracing::error!(err = ?e, path = %path_watcher.display(), "Failed to watch directory");
                }
            })
            .context("Failed to create file watcher")?;

        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .context("Failed to watch directory")?;

        // The file may have appeared between the first check and the watch.
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        tokio::time::timeout(timeout, async {
            rx.changed()
                .await
                .map_err(|e| anyhow::anyhow!("File watcher channel closed: {}", e))
        })
        .await
        .with_context(|| format!("Timeout waiting for file: {}", path.display()))??;

        // The watcher can fire on creation before the writer has flushed.
        tokio::time::sleep(Duration::from_millis(100)).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[tokio::test]
    async fn test_wait_for_existing_file() {
        let dir = TempDir::new("marginx-fs").unwrap();
        let path = dir.path().join("anvil.json");
        std::fs::write(&path, "{}").unwrap();

        FsHandler::wait_for_file(&path, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_file_times_out() {
        let dir = TempDir::new("marginx-fs").unwrap();
        let path = dir.path().join("never.json");

        let err = FsHandler::wait_for_file(&path, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timeout waiting for file"));
    }

    #[test]
    fn test_remove_stale() {
        let dir = TempDir::new("marginx-fs").unwrap();
        let path = dir.path().join("nested").join("anvil.json");

        FsHandler::ensure_dir(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{}").unwrap();
        FsHandler::remove_stale(&path).unwrap();
        assert!(!path.exists());
        // Removing a missing file is fine.
        FsHandler::remove_stale(&path).unwrap();
    }
}
