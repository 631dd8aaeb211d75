//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs)
//! and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Tree Building
//!
//! Trees can be built from:
//! - Index entries (staging area), nested by directory
//! - Existing tree objects (for reading)
//!
//! Entries being written are keyed by name, with directories keyed as `name/`, so the
//! map order is exactly git's tree order.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, with_header};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone)]
enum TreeEntry {
    /// File entry (blob, symlink or gitlink)
    File(IndexEntry),
    /// Directory entry (nested tree)
    Directory(Tree),
}

impl TreeEntry {
    fn object_type(&self) -> ObjectType {
        match self {
            TreeEntry::File(entry) if entry.metadata.mode == EntryMode::Gitlink => {
                ObjectType::Commit
            }
            TreeEntry::File(_) => ObjectType::Blob,
            TreeEntry::Directory(_) => ObjectType::Tree,
        }
    }

    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::File(entry) => entry.metadata.mode,
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeEntry::File(entry) => Ok(entry.oid.clone()),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

/// Git tree object representing a directory snapshot
///
/// Trees maintain two sets of entries:
/// - `readable_entries`: for trees loaded from the database
/// - `writeable_entries`: for trees being built from the index
#[derive(Debug, Clone, Default)]
pub struct Tree {
    readable_entries: BTreeMap<String, DatabaseEntry>,
    writeable_entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Build a tree from index entries
    ///
    /// Creates a hierarchical tree structure from a flat list of index entries.
    /// Files are organized into directories matching their path structure.
    pub fn build<'e>(entries: impl Iterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let parents = entry.parent_dirs()?;
            root.add_entry(&parents, entry)?;
        }

        Ok(root)
    }

    /// Visit every nested tree before its parent (post-order)
    ///
    /// Child IDs must be known (and stored) before the parent that embeds them.
    pub fn traverse<F>(&self, func: &F) -> anyhow::Result<()>
    where
        F: Fn(&Tree) -> anyhow::Result<()>,
    {
        for entry in self.writeable_entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(func)?;
            }
        }
        func(self)
    }

    fn add_entry(&mut self, parents: &[&Path], entry: &IndexEntry) -> anyhow::Result<()> {
        let Some((parent, rest)) = parents.split_first() else {
            self.writeable_entries.insert(
                entry.basename()?.to_string(),
                TreeEntry::File(entry.clone()),
            );
            return Ok(());
        };

        let parent = parent
            .file_name()
            .and_then(|s| s.to_str())
            .context("Invalid parent")?;
        let key = format!("{parent}/");

        let subtree = self
            .writeable_entries
            .entry(key)
            .or_insert_with(|| TreeEntry::Directory(Tree::default()));
        match subtree {
            TreeEntry::Directory(tree) => tree.add_entry(rest, entry),
            TreeEntry::File(_) => Err(anyhow::anyhow!(
                "Index entry {} conflicts with a file",
                entry.name.display()
            )),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.readable_entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.readable_entries.into_iter()
    }

    fn display_lines(&self) -> anyhow::Result<Vec<String>> {
        if self.writeable_entries.is_empty() {
            return Ok(self
                .readable_entries
                .iter()
                .map(|(name, entry)| {
                    let object_type = match entry.mode {
                        EntryMode::Directory => ObjectType::Tree,
                        EntryMode::Gitlink => ObjectType::Commit,
                        _ => ObjectType::Blob,
                    };
                    format!(
                        "{:0>6} {} {}\t{}",
                        entry.mode.as_str(),
                        object_type,
                        entry.oid,
                        name
                    )
                })
                .collect());
        }

        self.writeable_entries
            .iter()
            .map(|(name, tree_entry)| {
                Ok(format!(
                    "{:0>6} {} {}\t{}",
                    tree_entry.mode().as_str(),
                    tree_entry.object_type(),
                    tree_entry.oid()?,
                    name.trim_end_matches('/')
                ))
            })
            .collect()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, tree_entry) in &self.writeable_entries {
            let name = name.trim_end_matches('/');

            write!(content_bytes, "{} {}", tree_entry.mode().as_str(), name)?;
            content_bytes.push(0);
            tree_entry.oid()?.write_h40_to(&mut content_bytes)?;
        }

        Ok(with_header(self.object_type(), &content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            entries.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree {
            readable_entries: entries,
            writeable_entries: Default::default(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.display_lines()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default()
    }
}
