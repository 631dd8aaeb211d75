use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::areas::workspace::Workspace;
use crate::artifacts::status::file_status::{FileStatus, StatusRow};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Status of the whole repository, or of the paths under some filters
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub rows: Vec<StatusRow>,
}

impl StatusInfo {
    /// Rows with any difference between the three trees
    pub fn changed(&self) -> impl Iterator<Item = &StatusRow> {
        self.rows.iter().filter(|row| !row.is_unmodified())
    }

    pub fn is_clean(&self) -> bool {
        self.changed().next().is_none()
    }
}

#[derive(new)]
pub struct Status<'r> {
    repository: &'r Repository,
}

impl<'r> Status<'r> {
    pub fn file_status(&self, path: &Path, index: &mut Index) -> anyhow::Result<FileStatus> {
        if Workspace::is_ignored(path) {
            return Ok(FileStatus::Ignored);
        }

        let inspector = Inspector::new(self.repository);
        let head_tree = inspector.load_head_tree()?;
        let state = inspector.inspect(path, &head_tree, index)?;

        Ok(FileStatus::classify(
            state.head.as_ref(),
            state.workdir.as_ref(),
            state.stage.as_ref(),
        ))
    }

    /// One row per file known to HEAD, the index or the working directory
    ///
    /// With filters, only paths equal to or below one of them are reported.
    pub fn matrix(&self, index: &mut Index, filters: &[PathBuf]) -> anyhow::Result<StatusInfo> {
        let inspector = Inspector::new(self.repository);
        let head_tree = inspector.load_head_tree()?;

        let mut paths = BTreeSet::new();
        paths.extend(head_tree.keys().cloned());
        paths.extend(index.entries().map(|entry| entry.name.clone()));
        if self.repository.workspace().exists(Path::new("")) {
            paths.extend(self.repository.workspace().list_files(None)?);
        }

        let selected = |path: &PathBuf| {
            filters.is_empty()
                || filters
                    .iter()
                    .any(|filter| filter.as_os_str().is_empty() || path.starts_with(filter))
        };

        let mut rows = Vec::new();
        for path in paths.into_iter().filter(selected) {
            let state = inspector.inspect(&path, &head_tree, index)?;
            rows.push(StatusRow::new(
                path.to_string_lossy().to_string(),
                state.head.as_ref(),
                state.workdir.as_ref(),
                state.stage.as_ref(),
            ));
        }
        rows.sort();

        Ok(StatusInfo { rows })
    }
}
