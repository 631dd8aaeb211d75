//! Virtual filesystem
//!
//! Path-addressed byte storage with directory semantics. The repository areas never
//! touch the host filesystem directly; they go through the [`FileSystem`] trait so the
//! same engine runs on top of:
//!
//! - `memory`: an in-memory tree persisted as a single snapshot file
//! - `disk`: a host directory used as the root of the virtual tree
//!
//! ## Paths
//!
//! All paths are absolute (`/moonwalk/README.md`). `.` and `..` components are
//! resolved before lookup; relative paths are rejected.

pub mod disk;
pub mod memory;
mod snapshot;

use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

pub use disk::DiskFs;
pub use memory::{MemoryFs, OpenOptions};

/// Mode bits used for directories
pub const DIRECTORY_MODE: u32 = 0o40000;

/// Mode bits used for newly written files
pub const REGULAR_FILE_MODE: u32 = 0o100644;

/// Mode bits used for executable files
pub const EXECUTABLE_FILE_MODE: u32 = 0o100755;

/// Filesystem errors, named after their POSIX counterparts
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("EEXIST: file already exists, '{}'", .0.display())]
    AlreadyExists(PathBuf),
    #[error("ENOTDIR: not a directory, '{}'", .0.display())]
    NotADirectory(PathBuf),
    #[error("EISDIR: illegal operation on a directory, '{}'", .0.display())]
    IsADirectory(PathBuf),
    #[error("ENOTEMPTY: directory not empty, '{}'", .0.display())]
    NotEmpty(PathBuf),
    #[error("EINVAL: invalid path, '{}'", .0.display())]
    InvalidPath(PathBuf),
    #[error("corrupt filesystem snapshot: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// POSIX-style error code (`ENOENT`, `EEXIST`, ...)
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "ENOENT",
            FsError::AlreadyExists(_) => "EEXIST",
            FsError::NotADirectory(_) => "ENOTDIR",
            FsError::IsADirectory(_) => "EISDIR",
            FsError::NotEmpty(_) => "ENOTEMPTY",
            FsError::InvalidPath(_) => "EINVAL",
            FsError::Corrupt(_) => "ECORRUPT",
            FsError::Io(_) => "EIO",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// File status as reported by [`FileSystem::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileKind,
    pub mode: u32,
    pub size: u64,
    pub ino: u64,
    pub dev: u64,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub ctime: i64,
    pub ctime_nsec: i64,
}

impl Stat {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_executable(&self) -> bool {
        self.is_file() && self.mode & 0o111 != 0
    }
}

/// Path-addressed byte storage with directory semantics
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    fn read_file(&self, path: &Path) -> Result<Bytes, FsError>;

    /// Create or truncate a file. The parent directory must exist.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;

    /// Create a single directory. The parent directory must exist.
    fn mkdir(&self, path: &Path) -> Result<(), FsError>;

    /// Names of the entries of a directory, sorted
    fn readdir(&self, path: &Path) -> Result<Vec<String>, FsError>;

    fn unlink(&self, path: &Path) -> Result<(), FsError>;

    fn rmdir(&self, path: &Path) -> Result<(), FsError>;

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    fn stat(&self, path: &Path) -> Result<Stat, FsError>;

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FsError>;

    /// Persist pending state, if the backend needs to
    fn flush(&self) -> Result<(), FsError> {
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.stat(path).map(|stat| stat.is_dir()).unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.stat(path).map(|stat| stat.is_file()).unwrap_or(false)
    }

    /// Create a directory and every missing ancestor
    fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut current = PathBuf::from("/");

        for component in path.components().skip(1) {
            current.push(component);
            match self.stat(&current) {
                Ok(stat) if stat.is_dir() => continue,
                Ok(_) => return Err(FsError::NotADirectory(current)),
                Err(FsError::NotFound(_)) => self.mkdir(&current)?,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Remove a file, or a directory with everything below it
    fn remove_all(&self, path: &Path) -> Result<(), FsError> {
        if self.stat(path)?.is_dir() {
            for name in self.readdir(path)? {
                self.remove_all(&path.join(name))?;
            }
            self.rmdir(path)
        } else {
            self.unlink(path)
        }
    }

    /// Absolute paths of every file below `root`, depth-first in name order
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>, FsError> {
        let mut files = Vec::new();
        let mut pending = vec![normalize(root)?];

        while let Some(path) = pending.pop() {
            if !self.stat(&path)?.is_dir() {
                files.push(path);
                continue;
            }
            // reversed so that popping yields name order
            for name in self.readdir(&path)?.into_iter().rev() {
                pending.push(path.join(name));
            }
        }

        Ok(files)
    }
}

/// Resolve `.` and `..` in an absolute path
pub fn normalize(path: &Path) -> Result<PathBuf, FsError> {
    if !path.has_root() {
        return Err(FsError::InvalidPath(path.to_path_buf()));
    }

    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(part) => parts.push(part),
        }
    }

    let mut normalized = PathBuf::from("/");
    normalized.extend(parts);
    Ok(normalized)
}
