//! Host directory used as the root of the virtual tree

use crate::vfs::{FileKind, FileSystem, FsError, Stat, normalize};
use bytes::Bytes;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FsError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(DiskFs { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path backing a virtual path
    fn host_path(&self, path: &Path) -> Result<(PathBuf, PathBuf), FsError> {
        let virtual_path = normalize(path)?;
        let relative = virtual_path
            .strip_prefix("/")
            .map_err(|_| FsError::InvalidPath(virtual_path.clone()))?;

        Ok((self.root.join(relative), virtual_path))
    }
}

/// Map a host I/O error onto the POSIX-named variants
fn map_io_error(err: std::io::Error, path: &Path) -> FsError {
    let path = path.to_path_buf();
    match err.kind() {
        ErrorKind::NotFound => FsError::NotFound(path),
        ErrorKind::AlreadyExists => FsError::AlreadyExists(path),
        ErrorKind::NotADirectory => FsError::NotADirectory(path),
        ErrorKind::IsADirectory => FsError::IsADirectory(path),
        ErrorKind::DirectoryNotEmpty => FsError::NotEmpty(path),
        _ => FsError::Io(err),
    }
}

impl FileSystem for DiskFs {
    fn read_file(&self, path: &Path) -> Result<Bytes, FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        if host.is_dir() {
            return Err(FsError::IsADirectory(virtual_path));
        }

        fs::read(&host)
            .map(Bytes::from)
            .map_err(|err| map_io_error(err, &virtual_path))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        if host.is_dir() {
            return Err(FsError::IsADirectory(virtual_path));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&host)
            .map_err(|err| map_io_error(err, &virtual_path))?;

        let mut lock = file_guard::lock(&mut file, file_guard::Lock::Exclusive, 0, 1)?;
        lock.write_all(data)?;

        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        fs::create_dir(&host).map_err(|err| map_io_error(err, &virtual_path))
    }

    fn readdir(&self, path: &Path) -> Result<Vec<String>, FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        if host.is_file() {
            return Err(FsError::NotADirectory(virtual_path));
        }

        let mut names = fs::read_dir(&host)
            .map_err(|err| map_io_error(err, &virtual_path))?
            .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();

        Ok(names)
    }

    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        if host.is_dir() {
            return Err(FsError::IsADirectory(virtual_path));
        }

        fs::remove_file(&host).map_err(|err| map_io_error(err, &virtual_path))
    }

    fn rmdir(&self, path: &Path) -> Result<(), FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        if virtual_path == Path::new("/") {
            return Err(FsError::InvalidPath(virtual_path));
        }
        if host.is_file() {
            return Err(FsError::NotADirectory(virtual_path));
        }

        fs::remove_dir(&host).map_err(|err| map_io_error(err, &virtual_path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let (host_from, virtual_from) = self.host_path(from)?;
        let (host_to, _) = self.host_path(to)?;

        fs::rename(&host_from, &host_to).map_err(|err| map_io_error(err, &virtual_from))
    }

    fn stat(&self, path: &Path) -> Result<Stat, FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        let metadata = fs::metadata(&host).map_err(|err| map_io_error(err, &virtual_path))?;

        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };

        Ok(Stat {
            kind,
            mode: metadata.mode(),
            size: metadata.len(),
            ino: metadata.ino(),
            dev: metadata.dev(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FsError> {
        let (host, virtual_path) = self.host_path(path)?;
        fs::set_permissions(&host, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|err| map_io_error(err, &virtual_path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.host_path(path)
            .map(|(host, _)| host.is_file())
            .unwrap_or(false)
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>, FsError> {
        let (host_root, virtual_root) = self.host_path(root)?;
        if !host_root.exists() {
            return Err(FsError::NotFound(virtual_root));
        }

        walkdir::WalkDir::new(&host_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .map_err(|_| FsError::InvalidPath(entry.path().to_path_buf()))?;
                Ok(Path::new("/").join(relative))
            })
            .collect()
    }
}
