//! In-memory filesystem persisted as a single snapshot file
//!
//! The whole tree lives in a map keyed by normalized absolute path. Nothing touches the
//! host until [`FileSystem::flush`] is called, which writes the snapshot atomically
//! (temp file + rename). Opening with `wipe` discards whatever the store held.

use crate::vfs::snapshot;
use crate::vfs::{
    DIRECTORY_MODE, FileKind, FileSystem, FsError, REGULAR_FILE_MODE, Stat, normalize,
};
use bytes::Bytes;
use fake::rand;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Device id reported for every node
const DEVICE_ID: u64 = 1;

/// Owner reported for every node
const OWNER_ID: u32 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Start from an empty tree instead of the stored snapshot
    pub wipe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Directory,
    File(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) mode: u32,
    pub(crate) ino: u64,
    pub(crate) mtime: (i64, u32),
    pub(crate) ctime: (i64, u32),
}

impl Node {
    fn new(kind: NodeKind, mode: u32, ino: u64) -> Self {
        let now = now();
        Node {
            kind,
            mode,
            ino,
            mtime: now,
            ctime: now,
        }
    }

    fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    fn stat(&self) -> Stat {
        let (kind, size) = match &self.kind {
            NodeKind::Directory => (FileKind::Directory, 0),
            NodeKind::File(data) => (FileKind::File, data.len() as u64),
        };

        Stat {
            kind,
            mode: self.mode,
            size,
            ino: self.ino,
            dev: DEVICE_ID,
            uid: OWNER_ID,
            gid: OWNER_ID,
            mtime: self.mtime.0,
            mtime_nsec: self.mtime.1 as i64,
            ctime: self.ctime.0,
            ctime_nsec: self.ctime.1 as i64,
        }
    }
}

/// Node table of a [`MemoryFs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tree {
    pub(crate) nodes: BTreeMap<PathBuf, Node>,
    pub(crate) next_ino: u64,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathBuf::from("/"),
            Node::new(NodeKind::Directory, DIRECTORY_MODE, 1),
        );

        Tree { nodes, next_ino: 2 }
    }
}

impl Tree {
    fn allocate_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    fn node(&self, path: &Path) -> Result<&Node, FsError> {
        self.nodes
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    /// The parent of `path` must exist and be a directory
    fn check_parent(&self, path: &Path) -> Result<(), FsError> {
        let parent = path
            .parent()
            .ok_or_else(|| FsError::InvalidPath(path.to_path_buf()))?;

        match self.nodes.get(parent) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(FsError::NotADirectory(parent.to_path_buf())),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    /// Paths strictly below `path`
    fn descendants(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .range(path.to_path_buf()..)
            .skip(1)
            .take_while(|(key, _)| key.starts_with(path))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// In-memory [`FileSystem`] with optional snapshot persistence
#[derive(Debug, Default)]
pub struct MemoryFs {
    tree: RwLock<Tree>,
    store: Option<PathBuf>,
}

impl MemoryFs {
    /// An ephemeral filesystem that is never persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the filesystem stored at `store`
    ///
    /// A missing store file yields an empty filesystem. With `wipe` set the stored
    /// snapshot is ignored and overwritten on the next flush.
    pub fn open(store: impl Into<PathBuf>, options: OpenOptions) -> Result<Self, FsError> {
        let store = store.into();

        let tree = if options.wipe || !store.exists() {
            Tree::default()
        } else {
            let image = std::fs::read(&store)?;
            snapshot::decode(&image)?
        };

        tracing::debug!(
            "opened memory filesystem at {} ({} nodes)",
            store.display(),
            tree.nodes.len()
        );

        Ok(MemoryFs {
            tree: RwLock::new(tree),
            store: Some(store),
        })
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Drop every node except the root directory
    pub fn wipe(&self) -> Result<(), FsError> {
        *self.write_tree()? = Tree::default();
        Ok(())
    }

    fn read_tree(&self) -> Result<RwLockReadGuard<'_, Tree>, FsError> {
        self.tree
            .read()
            .map_err(|_| FsError::Corrupt("filesystem lock poisoned".to_string()))
    }

    fn write_tree(&self) -> Result<RwLockWriteGuard<'_, Tree>, FsError> {
        self.tree
            .write()
            .map_err(|_| FsError::Corrupt("filesystem lock poisoned".to_string()))
    }
}

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &Path) -> Result<Bytes, FsError> {
        let path = normalize(path)?;
        let tree = self.read_tree()?;

        match &tree.node(&path)?.kind {
            NodeKind::File(data) => Ok(data.clone()),
            NodeKind::Directory => Err(FsError::IsADirectory(path)),
        }
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut tree = self.write_tree()?;
        tree.check_parent(&path)?;

        let data = Bytes::copy_from_slice(data);
        let now = now();
        match tree.nodes.get_mut(&path) {
            Some(node) if node.is_dir() => return Err(FsError::IsADirectory(path)),
            Some(node) => {
                node.kind = NodeKind::File(data);
                node.mtime = now;
                node.ctime = now;
            }
            None => {
                let ino = tree.allocate_ino();
                tree.nodes.insert(
                    path,
                    Node::new(NodeKind::File(data), REGULAR_FILE_MODE, ino),
                );
            }
        }

        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut tree = self.write_tree()?;

        if tree.nodes.contains_key(&path) {
            return Err(FsError::AlreadyExists(path));
        }
        tree.check_parent(&path)?;

        let ino = tree.allocate_ino();
        tree.nodes
            .insert(path, Node::new(NodeKind::Directory, DIRECTORY_MODE, ino));

        Ok(())
    }

    fn readdir(&self, path: &Path) -> Result<Vec<String>, FsError> {
        let path = normalize(path)?;
        let tree = self.read_tree()?;

        if !tree.node(&path)?.is_dir() {
            return Err(FsError::NotADirectory(path));
        }

        Ok(tree
            .descendants(&path)
            .iter()
            .filter(|child| child.parent() == Some(path.as_path()))
            .filter_map(|child| child.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect())
    }

    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut tree = self.write_tree()?;

        if tree.node(&path)?.is_dir() {
            return Err(FsError::IsADirectory(path));
        }
        tree.nodes.remove(&path);

        Ok(())
    }

    fn rmdir(&self, path: &Path) -> Result<(), FsError> {
        let path = normalize(path)?;
        if path == Path::new("/") {
            return Err(FsError::InvalidPath(path));
        }

        let mut tree = self.write_tree()?;
        if !tree.node(&path)?.is_dir() {
            return Err(FsError::NotADirectory(path));
        }
        if !tree.descendants(&path).is_empty() {
            return Err(FsError::NotEmpty(path));
        }
        tree.nodes.remove(&path);

        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        if from == to {
            return Ok(());
        }
        if to.starts_with(&from) {
            return Err(FsError::InvalidPath(to));
        }

        let mut tree = self.write_tree()?;
        let source_is_dir = tree.node(&from)?.is_dir();
        tree.check_parent(&to)?;

        match tree.nodes.get(&to) {
            Some(target) if target.is_dir() && !source_is_dir => {
                return Err(FsError::IsADirectory(to));
            }
            Some(target) if !target.is_dir() && source_is_dir => {
                return Err(FsError::NotADirectory(to));
            }
            Some(_) if source_is_dir && !tree.descendants(&to).is_empty() => {
                return Err(FsError::NotEmpty(to));
            }
            _ => {}
        }

        let mut moved = tree.descendants(&from);
        moved.insert(0, from.clone());
        for old_path in moved {
            if let Some(node) = tree.nodes.remove(&old_path) {
                let suffix = old_path.strip_prefix(&from).unwrap_or(Path::new(""));
                let new_path = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                tree.nodes.insert(new_path, node);
            }
        }

        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<Stat, FsError> {
        let path = normalize(path)?;
        let tree = self.read_tree()?;

        Ok(tree.node(&path)?.stat())
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut tree = self.write_tree()?;

        let node = tree
            .nodes
            .get_mut(&path)
            .ok_or_else(|| FsError::NotFound(path.clone()))?;
        // keep the file type bits, replace the permission bits
        node.mode = (node.mode & !0o7777) | (mode & 0o7777);
        node.ctime = now();

        Ok(())
    }

    fn flush(&self) -> Result<(), FsError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let image = snapshot::encode(&*self.read_tree()?)?;

        if let Some(parent) = store.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = store.with_extension(format!("tmp-{}", rand::random::<u32>()));
        std::fs::write(&temp_path, &image)?;
        std::fs::rename(&temp_path, store)?;

        tracing::debug!(
            "flushed memory filesystem to {} ({} bytes)",
            store.display(),
            image.len()
        );

        Ok(())
    }
}

fn now() -> (i64, u32) {
    let now = chrono::Utc::now();
    (now.timestamp(), now.timestamp_subsec_nanos())
}
