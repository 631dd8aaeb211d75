//! Object database
//!
//! Loose objects live at `<gitdir>/objects/xx/yyyy...`, zlib-compressed, keyed by the
//! SHA-1 of their `<type> <size>\0<content>` representation.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable, with_header};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::raw::RawObject;
use crate::artifacts::objects::tree::Tree;
use crate::vfs::FileSystem;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct Database {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl Database {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Database { fs, path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Decompressed object, header included
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());

        self.read_object(&object_path)
            .with_context(|| format!("Object {object_id} not found"))
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.fs.is_file(&self.path.join(object_id.to_path()))
    }

    /// Store an object unless it is already present, returning its id
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        self.store_bytes(object_content)
    }

    /// Store content received from a packfile without reinterpreting it
    pub fn store_raw(&self, object_type: ObjectType, content: &[u8]) -> anyhow::Result<ObjectId> {
        self.store_bytes(with_header(object_type, content))
    }

    fn store_bytes(&self, object_content: Bytes) -> anyhow::Result<ObjectId> {
        let object_id = ObjectId::hash(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if !self.fs.exists(&object_path) {
            let object_dir = object_path
                .parent()
                .context(format!("Invalid object path {}", object_path.display()))?;
            self.fs.mkdir_all(object_dir).context(format!(
                "Unable to create object directory {}",
                object_dir.display()
            ))?;

            self.write_object(&object_path, object_content)?;
            tracing::debug!(oid = %object_id, "stored object");
        }

        Ok(object_id)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(
                object_reader,
            )?))),
            ObjectType::Tag => {
                let mut content = Vec::new();
                let mut object_reader = object_reader;
                object_reader.read_to_end(&mut content)?;
                Ok(ObjectBox::Tag(Box::new(RawObject::new(
                    ObjectType::Tag,
                    content.into(),
                ))))
            }
        }
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Follow annotated tags down to the object they point at
    pub fn peel(&self, object_id: &ObjectId) -> anyhow::Result<ObjectId> {
        let mut current = object_id.clone();

        while let ObjectBox::Tag(tag) = self.parse_object(&current)? {
            let content = String::from_utf8_lossy(tag.content()).to_string();
            let target = content
                .lines()
                .find_map(|line| line.strip_prefix("object "))
                .with_context(|| format!("Tag {current} has no object line"))?;
            current = ObjectId::try_parse(target.trim().to_string())?;
        }

        Ok(current)
    }

    /// Root tree of a commit, or the tree itself
    pub fn tree_oid_of(&self, object_id: &ObjectId) -> anyhow::Result<ObjectId> {
        let object_id = self.peel(object_id)?;

        match self.object_type(&object_id)? {
            ObjectType::Tree => Ok(object_id),
            ObjectType::Commit => {
                let commit = self
                    .parse_object_as_commit(&object_id)?
                    .with_context(|| format!("Object {object_id} is not a commit"))?;
                Ok(commit.tree_oid().clone())
            }
            other => anyhow::bail!("Object {object_id} is a {other}, not a tree-ish"),
        }
    }

    /// Every non-tree entry reachable from a tree, keyed by repository-relative path
    pub fn flatten_tree(
        &self,
        tree_oid: &ObjectId,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut entries = BTreeMap::new();
        self.flatten_tree_into(tree_oid, Path::new(""), &mut entries)?;
        Ok(entries)
    }

    fn flatten_tree_into(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        entries: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let tree = self
            .parse_object_as_tree(tree_oid)?
            .with_context(|| format!("Object {tree_oid} is not a tree"))?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.flatten_tree_into(&entry.oid, &path, entries)?;
            } else {
                entries.insert(path, entry);
            }
        }

        Ok(())
    }

    /// Type and content of an object, as needed when resolving deltas against it
    pub fn load_raw(&self, object_id: &ObjectId) -> anyhow::Result<RawObject> {
        let (object_type, mut object_reader) = self.parse_object_as_bytes(object_id)?;
        let mut content = Vec::new();
        object_reader.read_to_end(&mut content)?;

        Ok(RawObject::new(object_type, content.into()))
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl BufRead)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(object_content);

        let (object_type, size) = ObjectType::parse_object_header(&mut object_reader)?;
        let remaining = object_reader.get_ref().len() - object_reader.position() as usize;
        if remaining != size {
            anyhow::bail!("Object {object_id} is corrupt: expected {size} bytes, found {remaining}");
        }

        Ok((object_type, object_reader))
    }

    fn read_object(&self, object_path: &Path) -> anyhow::Result<Bytes> {
        let object_content = self.fs.read_file(object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(object_content)
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        self.fs
            .write_file(&temp_object_path, &object_content)
            .context(format!(
                "Unable to write object file {}",
                temp_object_path.display()
            ))?;

        // rename the temp file to the object file to make it atomic
        self.fs
            .rename(&temp_object_path, object_path)
            .context(format!(
                "Unable to rename object file to {}",
                object_path.display()
            ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Every stored object whose id starts with `prefix`
    ///
    /// More than one match means the abbreviation is ambiguous.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let dir_names = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255).map(|i| format!("{i:02x}")).collect()
        };

        let mut matches = Vec::new();
        for dir_name in dir_names {
            let dir_path = self.path.join(&dir_name);
            if !self.fs.is_dir(&dir_path) {
                continue;
            }

            for file_name in self.fs.readdir(&dir_path)? {
                let full_oid = format!("{dir_name}{file_name}");
                if !full_oid.starts_with(&prefix) {
                    continue;
                }
                // temp files left behind by an interrupted write are skipped
                if let Ok(oid) = ObjectId::try_parse(full_oid) {
                    matches.push(oid);
                }
            }
        }

        Ok(matches)
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(object_id)?;
        Ok(object_type)
    }
}
