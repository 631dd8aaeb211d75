use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::status::file_status::FileStatus;
use crate::artifacts::status::status_info::{Status, StatusInfo};
use std::path::{Path, PathBuf};

impl Repository {
    /// Status of one file across HEAD, the working directory and the index
    pub async fn status(&self, path: &Path) -> anyhow::Result<FileStatus> {
        let path = self.workspace().relative(path)?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let status = Status::new(self).file_status(&path, &mut index)?;
        self.write_refreshed_index(&mut index);

        Ok(status)
    }

    /// Status matrix of every known file, optionally restricted to some paths
    pub async fn status_matrix(&self, filters: &[PathBuf]) -> anyhow::Result<StatusInfo> {
        let filters = filters
            .iter()
            .map(|filter| self.workspace().relative(filter))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let status = Status::new(self).matrix(&mut index, &filters)?;
        self.write_refreshed_index(&mut index);

        Ok(status)
    }

    /// Persist stat data refreshed while computing a status
    ///
    /// A status is still correct without it, so failures are only logged.
    fn write_refreshed_index(&self, index: &mut Index) {
        if !index.is_changed() || !self.is_initialized() {
            return;
        }

        if let Err(err) = index.write_updates() {
            tracing::warn!(error = %err, "unable to write refreshed index");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::areas::repository::Repository;
    use crate::artifacts::objects::commit::Author;
    use crate::artifacts::status::file_status::FileStatus;
    use crate::commands::porcelain::commit::CommitOptions;
    use crate::vfs::{FileSystem, MemoryFs};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn options() -> CommitOptions {
        CommitOptions {
            author: Some(Author::new("Moon Walker".to_string(), "mw@example.com".to_string())),
            committer: None,
        }
    }

    #[fixture]
    fn repository() -> Repository {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        Repository::new(fs, "/moonwalk").unwrap()
    }

    async fn committed(repository: Repository) -> Repository {
        repository.write_file(Path::new("README.md"), "hello\n").unwrap();
        repository.write_file(Path::new("src/lib.rs"), "").unwrap();
        repository.add(&[PathBuf::from(".")]).await.unwrap();
        repository.commit("initial", options()).await.unwrap();
        repository
    }

    async fn status_of(repository: &Repository, path: &str) -> &'static str {
        repository.status(Path::new(path)).await.unwrap().as_str()
    }

    #[rstest]
    #[tokio::test]
    async fn file_lifecycle_through_the_statuses(repository: Repository) {
        repository.init().unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "absent");

        repository.write_file(Path::new("README.md"), "hello\n").unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "*added");

        repository.add(&[PathBuf::from("README.md")]).await.unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "added");

        repository.commit("initial", options()).await.unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "unmodified");

        repository.write_file(Path::new("README.md"), "changed\n").unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "*modified");

        repository.add(&[PathBuf::from("README.md")]).await.unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "modified");

        repository.remove(Path::new("README.md")).await.unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "*undeletemodified");
    }

    #[rstest]
    #[tokio::test]
    async fn deletions_show_up_unstaged_then_staged(repository: Repository) {
        let repository = committed(repository).await;

        repository.workspace().remove_file(Path::new("README.md")).unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "*deleted");

        repository.remove(Path::new("README.md")).await.unwrap();
        assert_eq!(status_of(&repository, "README.md").await, "deleted");
    }

    #[rstest]
    #[tokio::test]
    async fn git_internals_are_ignored(repository: Repository) {
        let repository = committed(repository).await;

        assert_eq!(
            repository.status(Path::new(".git/HEAD")).await.unwrap(),
            FileStatus::Ignored
        );
    }

    #[rstest]
    #[tokio::test]
    async fn matrix_covers_head_index_and_workdir(repository: Repository) {
        let repository = committed(repository).await;
        repository.write_file(Path::new("src/lib.rs"), "pub fn moon() {}\n").unwrap();
        repository.write_file(Path::new("notes.txt"), "todo\n").unwrap();
        repository.write_file(Path::new("staged.txt"), "staged\n").unwrap();
        repository.add(&[PathBuf::from("staged.txt")]).await.unwrap();

        let matrix = repository.status_matrix(&[]).await.unwrap();
        let rows = matrix
            .rows
            .iter()
            .map(|row| (row.path.as_str(), row.head, row.workdir, row.stage))
            .collect::<Vec<_>>();

        assert_eq!(
            rows,
            vec![
                ("README.md", 1, 1, 1),
                ("notes.txt", 0, 2, 0),
                ("src/lib.rs", 1, 2, 1),
                ("staged.txt", 0, 2, 2),
            ]
        );
        assert!(!matrix.is_clean());
        assert_eq!(
            serde_json::to_string(&matrix.rows[0]).unwrap(),
            r#"["README.md",1,1,1]"#
        );
    }

    #[rstest]
    #[tokio::test]
    async fn matrix_filters_select_subtrees(repository: Repository) {
        let repository = committed(repository).await;

        let matrix = repository
            .status_matrix(&[PathBuf::from("src")])
            .await
            .unwrap();

        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].path, "src/lib.rs");
        assert!(matrix.is_clean());
    }

    #[rstest]
    #[tokio::test]
    async fn touching_a_file_keeps_it_unmodified(repository: Repository) {
        let repository = committed(repository).await;
        // same content, new stat data
        repository.write_file(Path::new("README.md"), "hello\n").unwrap();

        assert_eq!(status_of(&repository, "README.md").await, "unmodified");
        assert!(repository.status_matrix(&[]).await.unwrap().is_clean());
    }
}
