use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use std::path::PathBuf;

impl Repository {
    /// Stage files, expanding directories, and return the staged paths
    pub async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
        self.ensure_initialized()?;

        // every pathspec is checked before anything is staged
        let mut files = Vec::new();
        for path in paths {
            let relative_path = self.workspace().relative(path)?;
            if !self.workspace().exists(&relative_path) {
                anyhow::bail!("pathspec '{}' did not match any files", path.display());
            }
            let root = (!relative_path.as_os_str().is_empty()).then_some(relative_path.as_path());
            files.extend(self.workspace().list_files(root)?);
        }
        files.sort();
        files.dedup();

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for path in &files {
            let blob = self.workspace().parse_blob(path)?;
            let metadata = self.workspace().stat_file(path)?;

            let blob_id = self.database().store(&blob)?;
            index.add(IndexEntry::new(path.clone(), blob_id, metadata))?;
        }

        index.write_updates()?;
        tracing::debug!(count = files.len(), "staged files");

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use crate::areas::repository::Repository;
    use crate::vfs::{FileSystem, MemoryFs};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn repository() -> Repository {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        Repository::new(fs, "/moonwalk").unwrap()
    }

    #[tokio::test]
    async fn directories_are_staged_file_by_file() {
        let repository = repository();
        repository.write_file(Path::new("README.md"), "hi\n").unwrap();
        repository.write_file(Path::new("src/a.rs"), "a").unwrap();
        repository.write_file(Path::new("src/nested/b.rs"), "b").unwrap();

        let staged = repository.add(&[PathBuf::from("src")]).await.unwrap();
        assert_eq!(
            staged,
            vec![PathBuf::from("src/a.rs"), PathBuf::from("src/nested/b.rs")]
        );

        let index = repository.index();
        let mut index = index.lock().await;
        index.rehydrate().unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.entry_by_path(Path::new("README.md")).is_none());
    }

    #[tokio::test]
    async fn adding_initializes_the_repository() {
        let repository = repository();
        repository.write_file(Path::new("README.md"), "hi\n").unwrap();
        assert!(!repository.is_initialized());

        repository.add(&[PathBuf::from("README.md")]).await.unwrap();

        assert!(repository.is_initialized());
        assert!(repository.fs().is_file(Path::new("/moonwalk/.git/index")));
    }

    #[tokio::test]
    async fn unknown_paths_stage_nothing() {
        let repository = repository();
        repository.write_file(Path::new("README.md"), "hi\n").unwrap();

        let error = repository
            .add(&[PathBuf::from("README.md"), PathBuf::from("missing.txt")])
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "pathspec 'missing.txt' did not match any files"
        );
        assert!(!repository.fs().exists(Path::new("/moonwalk/.git/index")));
    }

    #[tokio::test]
    async fn re_adding_a_changed_file_updates_its_entry() {
        let repository = repository();
        repository.write_file(Path::new("README.md"), "one\n").unwrap();
        repository.add(&[PathBuf::from("README.md")]).await.unwrap();
        repository.write_file(Path::new("README.md"), "two\n").unwrap();
        repository.add(&[PathBuf::from(".")]).await.unwrap();

        let index = repository.index();
        let mut index = index.lock().await;
        index.rehydrate().unwrap();
        let entry = index.entry_by_path(Path::new("README.md")).unwrap();
        assert_eq!(
            entry.oid,
            repository.hash_object(Path::new("README.md"), false).unwrap()
        );
    }
}
