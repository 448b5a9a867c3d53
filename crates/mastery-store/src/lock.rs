//! Exclusive lock file guarding a dataset's load, mutate and save cycle.
//!
//! Writers that hold a [`DatasetLock`] for the whole cycle never overwrite
//! each other's snapshots. Readers do not need it since snapshots are
//! replaced by rename.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Ownership of a dataset for writing. The lock file is removed on drop.
#[derive(Debug)]
pub struct DatasetLock {
    path: PathBuf,
}

impl DatasetLock {
    /// The lock file used for `data_path`, e.g. `mastery-data.json.lock`.
    pub fn path_for(data_path: &Path) -> PathBuf {
        let mut name = data_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        data_path.with_file_name(name)
    }

    /// Take the lock if it is free, or `None` if another writer holds it.
    pub fn try_acquire(data_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(data_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let lock = Self { path };
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("failed to write {}", lock.path.display()))?;
                Ok(Some(lock))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to create lock file {}", path.display()))
            }
        }
    }

    /// Wait up to `timeout` for the lock.
    pub async fn acquire(data_path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(lock) = Self::try_acquire(data_path)? {
                tracing::debug!(path = %lock.path.display(), "dataset lock acquired");
                return Ok(lock);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!(
                    "dataset {} is locked by another writer (remove {} if no mastery command is running)",
                    data_path.display(),
                    Self::path_for(data_path).display()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove lock file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_sits_next_to_dataset() {
        let path = DatasetLock::path_for(Path::new("data/school.json"));
        assert_eq!(path, PathBuf::from("data/school.json.lock"));
    }

    #[test]
    fn second_writer_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("nested").join("mastery-data.json");

        let first = DatasetLock::try_acquire(&data).unwrap().unwrap();
        assert!(DatasetLock::path_for(&data).exists());
        assert!(DatasetLock::try_acquire(&data).unwrap().is_none());

        drop(first);
        assert!(!DatasetLock::path_for(&data).exists());
        assert!(DatasetLock::try_acquire(&data).unwrap().is_some());
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("mastery-data.json");
        let _held = DatasetLock::try_acquire(&data).unwrap().unwrap();

        let err = DatasetLock::acquire(&data, Duration::from_millis(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("locked by another writer"));
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("mastery-data.json");
        let held = DatasetLock::try_acquire(&data).unwrap().unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });
        let lock = DatasetLock::acquire(&data, Duration::from_secs(5)).await.unwrap();
        releaser.await.unwrap();
        drop(lock);
        assert!(!DatasetLock::path_for(&data).exists());
    }
}
