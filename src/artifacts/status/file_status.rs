use crate::artifacts::objects::object_id::ObjectId;
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// Status of a single file
///
/// The names follow the convention of in-browser git clients: a leading `*` marks a
/// state with unstaged changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Inside `.git`
    Ignored,
    Unmodified,
    /// Working file differs from HEAD, nothing staged
    StarModified,
    /// Working file deleted, deletion not staged
    StarDeleted,
    /// Untracked, or added with further changes in the working file
    StarAdded,
    /// Not in HEAD, index or working directory
    Absent,
    /// Changed and staged
    Modified,
    /// Removed and the removal staged
    Deleted,
    /// New and staged
    Added,
    /// Working file matches HEAD but the index does not
    StarUnmodified,
    /// Staged, then deleted from the working directory
    StarAbsent,
    /// Removal staged, working file still matches HEAD
    StarUndeleted,
    /// Removal staged, working file exists and differs from HEAD
    StarUndeleteModified,
}

impl FileStatus {
    /// Status of a path given its blob id in HEAD, the working directory and the index
    pub fn classify(
        head: Option<&ObjectId>,
        workdir: Option<&ObjectId>,
        stage: Option<&ObjectId>,
    ) -> Self {
        match (head, workdir, stage) {
            (None, None, None) => FileStatus::Absent,
            (None, None, Some(_)) => FileStatus::StarAbsent,
            (None, Some(_), None) => FileStatus::StarAdded,
            (None, Some(w), Some(i)) if w == i => FileStatus::Added,
            (None, Some(_), Some(_)) => FileStatus::StarAdded,
            (Some(_), None, None) => FileStatus::Deleted,
            (Some(_), None, Some(_)) => FileStatus::StarDeleted,
            (Some(h), Some(w), None) if h == w => FileStatus::StarUndeleted,
            (Some(_), Some(_), None) => FileStatus::StarUndeleteModified,
            (Some(h), Some(w), Some(i)) if h == w && w == i => FileStatus::Unmodified,
            (Some(h), Some(w), Some(_)) if h == w => FileStatus::StarUnmodified,
            (Some(_), Some(w), Some(i)) if w == i => FileStatus::Modified,
            (Some(_), Some(_), Some(_)) => FileStatus::StarModified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Ignored => "ignored",
            FileStatus::Unmodified => "unmodified",
            FileStatus::StarModified => "*modified",
            FileStatus::StarDeleted => "*deleted",
            FileStatus::StarAdded => "*added",
            FileStatus::Absent => "absent",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Added => "added",
            FileStatus::StarUnmodified => "*unmodified",
            FileStatus::StarAbsent => "*absent",
            FileStatus::StarUndeleted => "*undeleted",
            FileStatus::StarUndeleteModified => "*undeletemodified",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of the status matrix: `[path, head, workdir, stage]`
///
/// - head: 0 absent, 1 present
/// - workdir: 0 absent, 1 identical to HEAD, 2 different from HEAD
/// - stage: 0 absent, 1 identical to HEAD, 2 identical to the working file,
///   3 different from both
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatusRow {
    pub path: String,
    pub head: u8,
    pub workdir: u8,
    pub stage: u8,
}

impl StatusRow {
    pub fn new(
        path: String,
        head: Option<&ObjectId>,
        workdir: Option<&ObjectId>,
        stage: Option<&ObjectId>,
    ) -> Self {
        let workdir_code = match workdir {
            None => 0,
            Some(w) if Some(w) == head => 1,
            Some(_) => 2,
        };
        let stage_code = match stage {
            None => 0,
            Some(i) if Some(i) == head => 1,
            Some(i) if Some(i) == workdir => 2,
            Some(_) => 3,
        };

        StatusRow {
            path,
            head: head.is_some() as u8,
            workdir: workdir_code,
            stage: stage_code,
        }
    }

    pub fn is_unmodified(&self) -> bool {
        (self.head, self.workdir, self.stage) == (1, 1, 1)
    }

    fn workdir_matches_stage(&self) -> bool {
        self.stage == 2 || (self.stage == 1 && self.workdir == 1)
    }

    /// Staged change letter of `git status --short`
    pub fn index_code(&self) -> char {
        match (self.head, self.stage) {
            (_, 0) if self.head == 1 => 'D',
            (0, 0) => ' ',
            (0, _) => 'A',
            (_, 1) => ' ',
            _ => 'M',
        }
    }

    /// Unstaged change letter of `git status --short`
    pub fn workdir_code(&self) -> char {
        if self.stage == 0 {
            ' '
        } else if self.workdir == 0 {
            'D'
        } else if self.workdir_matches_stage() {
            ' '
        } else {
            'M'
        }
    }

    pub fn is_untracked(&self) -> bool {
        self.head == 0 && self.stage == 0 && self.workdir != 0
    }

    /// Two-letter code of `git status --short` (`??` for untracked files)
    pub fn short_code(&self) -> String {
        if self.is_untracked() {
            return "??".to_string();
        }
        format!("{}{}", self.index_code(), self.workdir_code())
    }
}

impl Serialize for StatusRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_tuple(4)?;
        row.serialize_element(&self.path)?;
        row.serialize_element(&self.head)?;
        row.serialize_element(&self.workdir)?;
        row.serialize_element(&self.stage)?;
        row.end()
    }
}
