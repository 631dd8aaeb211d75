/// Reason a checkout refuses to touch a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    /// Tracked file with staged or unstaged changes
    StaleFile,
    /// Directory holding untracked files where a file must go
    StaleDirectory,
    /// Untracked file that differs from the incoming one
    UntrackedOverwritten,
}

#[derive(Debug)]
pub struct ConflictMessage {
    pub header: &'static str,
    pub footer: &'static str,
}

impl From<ConflictType> for ConflictMessage {
    fn from(value: ConflictType) -> Self {
        match value {
            ConflictType::StaleFile => Self {
                header: "Your local changes to the following files would be overwritten by checkout:",
                footer: "Please commit your changes before you switch branches.",
            },
            ConflictType::StaleDirectory => Self {
                header: "Updating the following directories would lose untracked files in them:",
                footer: "Please move or remove them before you switch branches.",
            },
            ConflictType::UntrackedOverwritten => Self {
                header: "The following untracked working tree files would be overwritten by checkout:",
                footer: "Please move or remove them before you switch branches.",
            },
        }
    }
}
