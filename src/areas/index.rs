//! Git index (staging area)
//!
//! The index tracks which files should be included in the next commit, along with
//! the stat data used to tell whether a working file changed without hashing it.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Checksum: SHA-1 hash of the entire index for integrity verification
//!
//! ## Data Structures
//!
//! - `entries`: Maps file paths to their index entries
//! - `children`: Maps directory paths to their children for efficient tree operations

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::vfs::FileSystem;
use anyhow::{Context, anyhow};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Git index (staging area)
#[derive(Debug, Clone)]
pub struct Index {
    fs: Arc<dyn FileSystem>,
    /// Path to the index file (typically `.git/index`)
    path: PathBuf,
    /// Tracked files mapped by path
    entries: BTreeMap<PathBuf, IndexEntry>,
    /// Directory hierarchy for efficient parent-child lookups
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    header: IndexHeader,
    /// Set when the entries differ from what is on disk
    changed: bool,
}

impl Index {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Index {
            fs,
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Drop every entry, as a checkout does before loading a new tree
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.changed = true;
    }

    /// Reload the index from the filesystem
    ///
    /// A missing or empty file is an empty index. A bad signature, an unknown version
    /// or a checksum mismatch is an error.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();
        self.changed = false;

        let data = match self.fs.read_file(&self.path) {
            Ok(data) => data,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => {
                return Err(err).context(format!(
                    "Unable to read index file {}",
                    self.path.display()
                ));
            }
        };
        if data.is_empty() {
            return Ok(());
        }
        if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(anyhow!("Index file is truncated"));
        }

        let mut reader = Checksum::new(Cursor::new(data));
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader.verify()
    }

    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || self.children.contains_key(path)
    }

    fn parse_header(&self, reader: &mut Checksum<Cursor<Bytes>>) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(Cursor::new(header_bytes))?;

        if header.marker != SIGNATURE {
            return Err(anyhow!("Invalid index file signature"));
        }

        if header.version != VERSION {
            return Err(anyhow!(
                "Unsupported index file version: {}",
                header.version
            ));
        }

        Ok(header.entries_count)
    }

    /// Entries are variable length: read the minimum, then whole blocks until the
    /// block ends with the NUL padding.
    fn parse_entries(
        &mut self,
        entries_count: u32,
        reader: &mut Checksum<Cursor<Bytes>>,
    ) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(Cursor::new(entry_bytes))?;
            self.store_entry(&entry)?;
        }

        self.header.entries_count = entries_count;

        Ok(())
    }

    /// A file replaces any entry at one of its parent paths, and a directory
    /// replaces every entry below it.
    fn discard_conflicts(&mut self, entry: &IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs()? {
            self.remove_entry(parent)?;
        }
        self.remove_children(&entry.name)
    }

    fn store_entry(&mut self, entry: &IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs()? {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries.insert(entry.name.clone(), entry.clone());

        Ok(())
    }

    fn remove_children(&mut self, path_name: &Path) -> anyhow::Result<()> {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_entry(&child)?;
            }
        }

        Ok(())
    }

    fn remove_entry(&mut self, path_name: &Path) -> anyhow::Result<()> {
        let Some(entry) = self.entries.remove(path_name) else {
            return Ok(());
        };

        for parent in entry.parent_dirs()? {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path_name);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }

        Ok(())
    }

    pub fn add(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        self.discard_conflicts(&entry)?;
        self.store_entry(&entry)?;

        self.header.entries_count = self.entries.len() as u32;
        self.changed = true;

        Ok(())
    }

    /// Drop a file, or every file below a directory
    pub fn remove(&mut self, path: &Path) -> anyhow::Result<()> {
        self.remove_entry(path)?;
        self.remove_children(path)?;

        self.header.entries_count = self.entries.len() as u32;
        self.changed = true;

        Ok(())
    }

    /// Serialize the index
    pub fn to_bytes(&self) -> anyhow::Result<Bytes> {
        let mut writer = Checksum::new(Vec::new());

        let header = IndexHeader {
            entries_count: self.entries.len() as u32,
            ..self.header.clone()
        };
        writer.write(&header.serialize()?)?;

        // entries are sorted by path bytes, which is not PathBuf order
        let mut entries = self.entries.values().collect::<Vec<_>>();
        entries.sort();
        for entry in entries {
            writer.write(&entry.serialize()?)?;
        }

        writer.write_checksum()?;
        Ok(writer.into_inner().into())
    }

    /// Write the index through `index.lock`, then move it into place
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let lock_path = self.lock_path();
        if self.fs.exists(&lock_path) {
            return Err(anyhow!(
                "Unable to create '{}': File exists. Another process may be writing the index.",
                lock_path.display()
            ));
        }

        let data = self.to_bytes()?;
        self.fs
            .write_file(&lock_path, &data)
            .context(format!("Unable to write {}", lock_path.display()))?;
        self.fs
            .rename(&lock_path, &self.path)
            .context(format!("Unable to commit index to {}", self.path.display()))?;

        self.header.entries_count = self.entries.len() as u32;
        self.changed = false;
        tracing::debug!(entries = self.entries.len(), "wrote index");

        Ok(())
    }

    /// Replace the stat data of an entry whose content is known to be unchanged
    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(path) {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Entries sorted by path bytes
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        let mut entries = self.entries.values().collect::<Vec<_>>();
        entries.sort();
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked paths equal to or below `path`; `.` matches everything
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|entry_path| path == Path::new(".") || entry_path.starts_with(path))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use crate::artifacts::objects::object_id::ObjectId;
    use crate::vfs::MemoryFs;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn fs() -> Arc<dyn FileSystem> {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("/repo/.git")).unwrap();
        Arc::new(fs)
    }

    fn entry(name: &str) -> IndexEntry {
        IndexEntry::new(
            PathBuf::from(name),
            ObjectId::hash(name.as_bytes()),
            EntryMetadata::from_mode(Path::new(name), EntryMode::File(FileMode::Regular)),
        )
    }

    fn names(index: &Index) -> Vec<String> {
        index
            .entries()
            .map(|entry| entry.name.to_string_lossy().to_string())
            .collect()
    }

    fn index_at(fs: &Arc<dyn FileSystem>) -> Index {
        Index::new(fs.clone(), PathBuf::from("/repo/.git/index"))
    }

    #[rstest]
    fn a_missing_index_file_is_empty(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.rehydrate().unwrap();

        assert!(index.is_empty());
    }

    #[rstest]
    fn written_entries_are_read_back_in_byte_order(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        for name in ["b.txt", "a/b", "a.txt", "a-c"] {
            index.add(entry(name)).unwrap();
        }
        index.write_updates().unwrap();

        let mut reloaded = index_at(&fs);
        reloaded.rehydrate().unwrap();

        assert_eq!(names(&reloaded), vec!["a-c", "a.txt", "a/b", "b.txt"]);
        assert!(!fs.exists(Path::new("/repo/.git/index.lock")));
    }

    #[rstest]
    fn a_file_replaces_a_directory_with_the_same_name(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.add(entry("alice.txt")).unwrap();
        index.add(entry("nested/bob.txt")).unwrap();
        index.add(entry("nested/inner/claire.txt")).unwrap();

        index.add(entry("nested")).unwrap();

        assert_eq!(names(&index), vec!["alice.txt", "nested"]);
    }

    #[rstest]
    fn a_directory_replaces_a_file_with_the_same_name(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.add(entry("alice.txt")).unwrap();
        index.add(entry("bob.txt")).unwrap();

        index.add(entry("alice.txt/nested.txt")).unwrap();

        assert_eq!(names(&index), vec!["alice.txt/nested.txt", "bob.txt"]);
    }

    #[rstest]
    fn removing_a_directory_drops_everything_below_it(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.add(entry("keep.txt")).unwrap();
        index.add(entry("dir/a.txt")).unwrap();
        index.add(entry("dir/sub/b.txt")).unwrap();

        index.remove(Path::new("dir")).unwrap();

        assert_eq!(names(&index), vec!["keep.txt"]);
        assert!(!index.is_directly_tracked(Path::new("dir")));
    }

    #[rstest]
    fn a_corrupted_checksum_is_rejected(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.add(entry("a.txt")).unwrap();
        index.write_updates().unwrap();

        let mut data = fs.read_file(Path::new("/repo/.git/index")).unwrap().to_vec();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        fs.write_file(Path::new("/repo/.git/index"), &data).unwrap();

        let mut reloaded = index_at(&fs);
        let err = reloaded.rehydrate().unwrap_err();
        assert!(err.to_string().contains("Checksum"));
    }

    #[rstest]
    fn a_wrong_signature_is_rejected(fs: Arc<dyn FileSystem>) {
        let mut index = index_at(&fs);
        index.write_updates().unwrap();

        let mut data = fs.read_file(Path::new("/repo/.git/index")).unwrap().to_vec();
        data[..4].copy_from_slice(b"CRID");
        fs.write_file(Path::new("/repo/.git/index"), &data).unwrap();

        let mut reloaded = index_at(&fs);
        assert!(reloaded.rehydrate().is_err());
    }

    #[rstest]
    fn a_held_lock_blocks_writes(fs: Arc<dyn FileSystem>) {
        fs.write_file(Path::new("/repo/.git/index.lock"), b"").unwrap();

        let mut index = index_at(&fs);
        index.add(entry("a.txt")).unwrap();
        assert!(index.write_updates().is_err());
    }
}
