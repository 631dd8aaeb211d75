use crate::vfs::Stat;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Mode of a tree or index entry
#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    #[default]
    Directory,
    Symlink,
    Gitlink,
}

impl EntryMode {
    pub fn as_str(&self) -> &str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Directory => "40000",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Directory => 0o40000,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    pub fn is_tree(&self) -> bool {
        *self == EntryMode::Directory
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryMode::File(_))
    }

    /// Parse the octal mode of a tree entry (`100644`, `40000`, ...)
    pub fn from_octal_str(mode: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(mode, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode: {mode}"))?;
        Self::try_from(mode)
    }

    /// Mode a working file is recorded with
    pub fn from_stat(stat: &Stat) -> Self {
        if stat.is_dir() {
            EntryMode::Directory
        } else if stat.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        }
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            // legacy group-writable blobs
            0o100664 => Ok(EntryMode::File(FileMode::Regular)),
            0o40000 => Ok(EntryMode::Directory),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(anyhow::anyhow!("Invalid entry mode: {mode:o}")),
        }
    }
}

impl From<EntryMode> for u32 {
    fn from(mode: EntryMode) -> Self {
        mode.as_u32()
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("40000", EntryMode::Directory)]
    #[case("120000", EntryMode::Symlink)]
    #[case("160000", EntryMode::Gitlink)]
    fn octal_modes_parse(#[case] input: &str, #[case] expected: EntryMode) {
        let mode = EntryMode::from_octal_str(input).unwrap();
        pretty_assertions::assert_eq!(mode, expected);
        pretty_assertions::assert_eq!(mode.as_str(), input);
    }

    #[test]
    fn unknown_modes_are_errors() {
        assert!(EntryMode::from_octal_str("100600").is_err());
        assert!(EntryMode::from_octal_str("zzz").is_err());
    }
}
