use crate::areas::repository::Repository;
use crate::areas::workspace::Workspace;
use anyhow::Context;
use std::path::Path;

impl Repository {
    /// Create the repository directory, returning whether it was missing
    pub fn setup(&self) -> anyhow::Result<bool> {
        if self.fs().is_dir(self.path()) {
            return Ok(false);
        }

        self.fs()
            .mkdir_all(self.path())
            .with_context(|| format!("Unable to create {}", self.path().display()))?;
        tracing::debug!(path = %self.path().display(), "created repository directory");

        Ok(true)
    }

    /// Entry names at the top of the repository directory, `.git` included
    pub fn list_directory(&self) -> anyhow::Result<Vec<String>> {
        self.workspace().list_dir(Path::new(""))
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<String> {
        let file_path = self.workspace().relative(file_path)?;
        let data = self.workspace().read_file(&file_path)?;

        String::from_utf8(data.to_vec())
            .with_context(|| format!("{} is not valid UTF-8", file_path.display()))
    }

    pub fn write_file(&self, file_path: &Path, contents: &str) -> anyhow::Result<()> {
        let file_path = self.workspace().relative(file_path)?;
        if file_path.as_os_str().is_empty() {
            anyhow::bail!("Cannot write to the repository directory itself");
        }
        if Workspace::is_ignored(&file_path) {
            anyhow::bail!("Refusing to write inside .git: {}", file_path.display());
        }

        self.workspace()
            .write_file(&file_path, contents.as_bytes(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{FileSystem, MemoryFs};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    #[fixture]
    fn repository() -> Repository {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        Repository::new(fs, "/moonwalk").unwrap()
    }

    #[rstest]
    fn setup_creates_the_directory_once(repository: Repository) {
        assert!(repository.setup().unwrap());
        assert!(!repository.setup().unwrap());
        assert!(repository.list_directory().unwrap().is_empty());
    }

    #[rstest]
    fn written_files_read_back(repository: Repository) {
        repository
            .write_file(Path::new("docs/README.md"), "# moonwalk\n")
            .unwrap();

        assert_eq!(
            repository.read_file(Path::new("/moonwalk/docs/README.md")).unwrap(),
            "# moonwalk\n"
        );
        assert_eq!(repository.list_directory().unwrap(), vec!["docs"]);
    }

    #[rstest]
    fn reading_a_missing_file_fails(repository: Repository) {
        repository.setup().unwrap();
        assert!(repository.read_file(Path::new("README.md")).is_err());
    }

    #[rstest]
    fn paths_outside_the_repository_are_rejected(repository: Repository) {
        assert!(repository.write_file(Path::new("../escape.txt"), "x").is_err());
        assert!(repository.write_file(Path::new(".git/HEAD"), "x").is_err());
    }
}
