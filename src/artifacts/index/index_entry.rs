//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//!
//! ## Entry Format
//!
//! Entries are stored in a binary format with 8-byte alignment.
//! Metadata includes both file status (mode, size) and timestamps (mtime, ctime)
//! which enable fast change detection without reading file content.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::vfs::Stat;
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::cmp::min;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Largest path length representable in the entry flags
const MAX_PATH_SIZE: usize = 0xfff;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Index entry representing a tracked file
#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// File path relative to the repository root, `/`-separated
    pub name: PathBuf,
    /// SHA-1 hash of file content
    pub oid: ObjectId,
    /// File metadata (mode, size, timestamps)
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name"))
    }

    /// Every ancestor directory of the entry, outermost first
    pub fn parent_dirs(&self) -> anyhow::Result<Vec<&Path>> {
        let mut dirs = Vec::new();
        let mut parent = self.name.parent();

        while let Some(new_parent) = parent {
            if new_parent.as_os_str().is_empty() {
                break;
            }
            dirs.push(new_parent);
            parent = new_parent.parent();
        }
        dirs.reverse();

        Ok(dirs)
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    /// Byte order of the path, as git sorts index entries
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .as_os_str()
            .as_encoded_bytes()
            .cmp(other.name.as_os_str().as_encoded_bytes())
    }
}

/// File metadata stored in index entries
///
/// ## Timestamps
///
/// - `ctime`: File status change time (inode modification)
/// - `mtime`: File content modification time
///
/// Both include nanosecond precision for accurate change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Path length, capped at 0xfff
    pub flags: u32,
}

impl EntryMetadata {
    pub fn from_stat(file_path: &Path, stat: &Stat) -> Self {
        Self {
            ctime: stat.ctime,
            ctime_nsec: stat.ctime_nsec,
            mtime: stat.mtime,
            mtime_nsec: stat.mtime_nsec,
            dev: stat.dev,
            ino: stat.ino,
            mode: EntryMode::from_stat(stat),
            uid: stat.uid,
            gid: stat.gid,
            size: stat.size,
            flags: path_flags(file_path),
        }
    }

    /// Metadata for an entry written from a tree object, with no stat data yet
    pub fn from_mode(file_path: &Path, mode: EntryMode) -> Self {
        Self {
            mode,
            flags: path_flags(file_path),
            ..Default::default()
        }
    }
}

fn path_flags(file_path: &Path) -> u32 {
    min(file_path.as_os_str().len(), MAX_PATH_SIZE) as u32
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid entry name"))?;

        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + entry_name.len());
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<NetworkEndian>(self.metadata.flags as u16)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(anyhow::anyhow!("Invalid index entry size"));
        }

        let ctime = NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode = EntryMode::try_from(NetworkEndian::read_u32(&bytes[24..28]))?;
        let uid = NetworkEndian::read_u32(&bytes[28..32]);
        let gid = NetworkEndian::read_u32(&bytes[32..36]);
        let size = NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let oid = ObjectId::from_raw_bytes(&bytes[40..60]);
        let flags = NetworkEndian::read_u16(&bytes[60..62]) as u32;

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("Missing null terminator in entry name"))?;
        let name = std::str::from_utf8(&bytes[62..62 + name_end])
            .map_err(|_| anyhow::anyhow!("Invalid UTF-8 in entry name"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
                flags,
            },
        })
    }
}
