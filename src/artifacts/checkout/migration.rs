//! Checkout migration and conflict detection
//!
//! Checking out a commit means:
//!
//! 1. Comparing the files of the current and target trees
//! 2. Refusing when a changed path carries local work
//! 3. Deleting, creating and rewriting working files
//! 4. Updating the index entries of every changed path
//!
//! ## Conflict Detection
//!
//! A path conflicts when neither its staged nor its working content matches the
//! current tree, unless both already match the target. Untracked files that would be
//! replaced, and directories with untracked files where a file must go, conflict too.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::status::inspector::{HeadTree, Inspector};
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What happens to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add(DatabaseEntry),
    Delete,
    Modify(DatabaseEntry),
}

pub struct Migration<'r> {
    repository: &'r Repository,
    index: &'r mut Index,
    inspector: Inspector<'r>,
    current: HeadTree,
    target: HeadTree,
    actions: BTreeMap<PathBuf, Action>,
    conflicts: BTreeMap<ConflictType, BTreeSet<PathBuf>>,
}

impl<'r> Migration<'r> {
    pub fn new(
        repository: &'r Repository,
        index: &'r mut Index,
        current: HeadTree,
        target: HeadTree,
    ) -> Self {
        Self {
            repository,
            index,
            inspector: Inspector::new(repository),
            current,
            target,
            actions: BTreeMap::new(),
            conflicts: BTreeMap::new(),
        }
    }

    pub fn actions(&self) -> &BTreeMap<PathBuf, Action> {
        &self.actions
    }

    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.update_workspace()?;
        self.update_index()?;

        Ok(())
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let paths = self
            .current
            .keys()
            .chain(self.target.keys())
            .cloned()
            .collect::<BTreeSet<_>>();

        for path in paths {
            let action = match (self.current.get(&path), self.target.get(&path)) {
                (None, Some(new)) => Action::Add(new.clone()),
                (Some(_), None) => Action::Delete,
                (Some(old), Some(new)) if old != new => Action::Modify(new.clone()),
                _ => continue,
            };

            self.check_for_conflict(&path)?;
            self.actions.insert(path, action);
        }

        let errors = self.collect_errors();
        if !errors.is_empty() {
            anyhow::bail!("{}\nAborting", errors.join("\n"));
        }

        Ok(())
    }

    fn check_for_conflict(&mut self, path: &Path) -> anyhow::Result<()> {
        let state = self.inspector.inspect(path, &self.current, self.index)?;
        let new_oid = self.target.get(path).map(|entry| entry.oid.clone());

        let matches_current = state.stage == state.head && state.workdir == state.head;
        let matches_target = state.stage == new_oid && state.workdir == new_oid;

        if !matches_current && !matches_target {
            let conflict_type = if state.head.is_none() && state.stage.is_none() {
                ConflictType::UntrackedOverwritten
            } else {
                ConflictType::StaleFile
            };
            self.conflicts
                .entry(conflict_type)
                .or_default()
                .insert(path.to_path_buf());
        }

        if new_oid.is_some() && self.has_untracked_files_under(path)? {
            self.conflicts
                .entry(ConflictType::StaleDirectory)
                .or_default()
                .insert(path.to_path_buf());
        }

        Ok(())
    }

    /// Whether `path` is a directory holding files the current tree does not know
    fn has_untracked_files_under(&self, path: &Path) -> anyhow::Result<bool> {
        let workspace = self.repository.workspace();
        if !workspace.exists(path) || !workspace.stat(path)?.is_dir() {
            return Ok(false);
        }

        Ok(workspace
            .list_files(Some(path))?
            .iter()
            .any(|file| !self.current.contains_key(file)))
    }

    fn collect_errors(&self) -> Vec<String> {
        self.conflicts
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(conflict_type, paths)| {
                let ConflictMessage { header, footer } = (*conflict_type).into();
                let paths = paths
                    .iter()
                    .map(|path| format!("\t{}", path.display()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("error: {header}\n{paths}\n{footer}")
            })
            .collect()
    }

    fn update_workspace(&self) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        // deletions first, so a directory can take the place of a removed file
        for (path, action) in &self.actions {
            if *action == Action::Delete {
                workspace.remove_file(path)?;
            }
        }

        for (path, action) in &self.actions {
            let (Action::Add(entry) | Action::Modify(entry)) = action else {
                continue;
            };
            if entry.mode == EntryMode::Gitlink {
                tracing::warn!(path = %path.display(), "skipping submodule");
                continue;
            }

            let blob = self
                .repository
                .database()
                .parse_object_as_blob(&entry.oid)?
                .with_context(|| format!("Object {} is not a blob", entry.oid))?;
            workspace.write_file(path, blob.content(), Some(entry.mode))?;
        }

        Ok(())
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        for (path, action) in &self.actions {
            match action {
                Action::Delete => self.index.remove(path)?,
                Action::Add(entry) | Action::Modify(entry) => {
                    let mut metadata = if entry.mode == EntryMode::Gitlink {
                        EntryMetadata::from_mode(path, entry.mode)
                    } else {
                        workspace.stat_file(path)?
                    };
                    metadata.mode = entry.mode;

                    self.index
                        .add(IndexEntry::new(path.clone(), entry.oid.clone(), metadata))?;
                }
            }
        }

        Ok(())
    }
}
