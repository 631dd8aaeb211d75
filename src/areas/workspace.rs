//! Working tree on the virtual filesystem
//!
//! Paths handed to and returned from the workspace are relative to the repository
//! directory and `/`-separated. Everything under `.git` is invisible here.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::vfs::{EXECUTABLE_FILE_MODE, FileSystem, REGULAR_FILE_MODE, Stat};
use anyhow::Context;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

#[derive(Debug)]
pub struct Workspace {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl Workspace {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Workspace { fs, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn absolute(&self, file_path: &Path) -> PathBuf {
        self.path.join(file_path)
    }

    /// Whether a path is inside `.git` (or is `.git` itself)
    pub fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => IGNORED_PATHS.contains(&name.to_string_lossy().as_ref()),
            _ => false,
        })
    }

    /// Repository-relative form of a caller-supplied path
    ///
    /// Accepts paths relative to the repository as well as absolute paths inside it.
    /// `.` and the empty path are the repository root.
    pub fn relative(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let absolute = crate::vfs::normalize(&self.path.join(path))?;
        let relative = absolute.strip_prefix(&self.path).with_context(|| {
            format!(
                "'{}' is outside repository at '{}'",
                path.display(),
                self.path.display()
            )
        })?;
        Ok(relative.to_path_buf())
    }

    pub fn exists(&self, file_path: &Path) -> bool {
        self.fs.exists(&self.absolute(file_path))
    }

    /// Entry names of a directory, `.git` included
    pub fn list_dir(&self, dir_path: &Path) -> anyhow::Result<Vec<String>> {
        let dir_path = self.absolute(dir_path);
        self.fs
            .readdir(&dir_path)
            .with_context(|| format!("Unable to list {}", dir_path.display()))
    }

    /// Every file below `root` (the whole tree by default), in name order
    ///
    /// A file root yields just that file. A missing root is an error.
    pub fn list_files(&self, root: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root_path = match root {
            Some(root) => self.absolute(root),
            None => self.path.clone(),
        };

        if !self.fs.exists(&root_path) {
            anyhow::bail!(
                "The specified path does not exist: {}",
                root_path.display()
            );
        }

        let files = self
            .fs
            .walk_files(&root_path)?
            .into_iter()
            .filter_map(|path| path.strip_prefix(&self.path).ok().map(Path::to_path_buf))
            .filter(|path| !Self::is_ignored(path))
            .collect();

        Ok(files)
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let path = self.absolute(file_path);
        self.fs
            .read_file(&path)
            .with_context(|| format!("Unable to read {}", file_path.display()))
    }

    pub fn parse_blob(&self, file_path: &Path) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    pub fn stat(&self, file_path: &Path) -> anyhow::Result<Stat> {
        let path = self.absolute(file_path);
        self.fs
            .stat(&path)
            .with_context(|| format!("Unable to stat {}", file_path.display()))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        Ok(EntryMetadata::from_stat(file_path, &self.stat(file_path)?))
    }

    /// Write a file, creating parent directories and replacing whatever is in the way
    pub fn write_file(
        &self,
        file_path: &Path,
        data: &[u8],
        mode: Option<EntryMode>,
    ) -> anyhow::Result<()> {
        let path = self.absolute(file_path);
        self.make_parent_dirs(&path)?;

        if self.fs.is_dir(&path) {
            self.fs
                .remove_all(&path)
                .with_context(|| format!("Failed to remove existing directory: {}", file_path.display()))?;
        }

        self.fs
            .write_file(&path, data)
            .with_context(|| format!("Failed to write to file: {}", file_path.display()))?;

        let permissions = match mode {
            Some(EntryMode::File(FileMode::Executable)) => EXECUTABLE_FILE_MODE,
            _ => REGULAR_FILE_MODE,
        };
        if self.fs.stat(&path)?.mode != permissions {
            self.fs.chmod(&path, permissions).with_context(|| {
                format!("Failed to set permissions for file: {}", file_path.display())
            })?;
        }

        Ok(())
    }

    /// Create every missing directory above `path`, replacing files in the way
    fn make_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };

        let mut current = PathBuf::new();
        for component in parent.components() {
            current.push(component);
            if self.fs.is_file(&current) {
                self.fs.unlink(&current)?;
            }
        }

        self.fs
            .mkdir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        Ok(())
    }

    /// Delete a file and every directory it leaves empty
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let path = self.absolute(file_path);
        if !self.fs.exists(&path) {
            return Ok(());
        }

        self.fs
            .remove_all(&path)
            .with_context(|| format!("Failed to remove file: {}", file_path.display()))?;
        self.prune_empty_parent_dirs(&path)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let mut parent = path.parent();

        while let Some(dir) = parent {
            if dir == self.path || !dir.starts_with(&self.path) || !self.fs.readdir(dir)?.is_empty() {
                break;
            }
            self.fs.rmdir(dir)?;
            parent = dir.parent();
        }

        Ok(())
    }
}
