use crate::areas::repository::Repository;
use std::path::{Path, PathBuf};

impl Repository {
    /// Unstage a file, or every file below a directory, leaving the working tree alone
    pub async fn remove(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let path = self.workspace().relative(path)?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let removed = if path.as_os_str().is_empty() {
            index.entries().map(|entry| entry.name.clone()).collect()
        } else {
            index.entries_under_path(&path)
        };
        if removed.is_empty() {
            return Ok(removed);
        }

        for removed_path in &removed {
            index.remove(removed_path)?;
        }
        index.write_updates()?;

        Ok(removed)
    }
}
