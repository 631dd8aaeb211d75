use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type HeadTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Blob ids of one path in HEAD, the working directory and the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathState {
    pub head: Option<ObjectId>,
    pub workdir: Option<ObjectId>,
    pub stage: Option<ObjectId>,
}

#[derive(new)]
pub struct Inspector<'r> {
    repository: &'r Repository,
}

impl<'r> Inspector<'r> {
    /// Files of the HEAD commit, empty on an unborn branch
    pub fn load_head_tree(&self) -> anyhow::Result<HeadTree> {
        match self.repository.refs().read_head()? {
            Some(head_oid) => {
                let database = self.repository.database();
                database.flatten_tree(&database.tree_oid_of(&head_oid)?)
            }
            None => Ok(HeadTree::new()),
        }
    }

    /// Blob id of a working file, `None` when it is missing or a directory
    ///
    /// When the index entry's stat data still matches the file, the staged id is
    /// trusted without reading the file. When the content turns out unchanged but the
    /// stat data is stale, the index entry is refreshed.
    pub fn workdir_oid(&self, path: &Path, index: &mut Index) -> anyhow::Result<Option<ObjectId>> {
        let workspace = self.repository.workspace();
        if !workspace.exists(path) {
            return Ok(None);
        }
        let stat = workspace.stat(path)?;
        if !stat.is_file() {
            return Ok(None);
        }
        let metadata = EntryMetadata::from_stat(path, &stat);

        if let Some(entry) = index.entry_by_path(path)
            && entry.stat_match(&metadata)
            && entry.times_match(&metadata)
        {
            return Ok(Some(entry.oid.clone()));
        }

        let oid = workspace.parse_blob(path)?.object_id()?;

        let stale = index.entry_by_path(path).is_some_and(|entry| {
            entry.oid == oid && entry.metadata.mode == metadata.mode && entry.metadata != metadata
        });
        if stale {
            tracing::debug!(path = %path.display(), "refreshing stale index stat data");
            index.update_entry_stat(path, metadata);
        }

        Ok(Some(oid))
    }

    pub fn inspect(
        &self,
        path: &Path,
        head_tree: &HeadTree,
        index: &mut Index,
    ) -> anyhow::Result<PathState> {
        Ok(PathState {
            head: head_tree.get(path).map(|entry| entry.oid.clone()),
            workdir: self.workdir_oid(path, index)?,
            stage: index.entry_by_path(path).map(|entry| entry.oid.clone()),
        })
    }
}
