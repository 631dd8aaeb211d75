use crate::areas::repository::Repository;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use serde::Serialize;

/// One file of `ls-tree -r`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LsTreeEntry {
    pub mode: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub oid: ObjectId,
    pub path: String,
}

impl std::fmt::Display for LsTreeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0>6} {} {}\t{}", self.mode, self.object_type, self.oid, self.path)
    }
}

impl Repository {
    /// Every file of a commit or tree, recursively, in path order
    pub fn ls_tree(&self, name: &str) -> anyhow::Result<Vec<LsTreeEntry>> {
        let oid = self.resolve_object(name)?;
        let tree_oid = self.database().tree_oid_of(&oid)?;

        let entries = self
            .database()
            .flatten_tree(&tree_oid)?
            .into_iter()
            .map(|(path, entry)| LsTreeEntry {
                mode: entry.mode.as_str().to_string(),
                object_type: match entry.mode {
                    EntryMode::Gitlink => "commit",
                    _ => "blob",
                }
                .to_string(),
                oid: entry.oid,
                path: path.to_string_lossy().to_string(),
            })
            .collect();

        Ok(entries)
    }
}
