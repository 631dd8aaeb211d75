//! Git object identifier (SHA-1 hash)
//!
//! Object IDs are 40-character hexadecimal strings representing SHA-1 hashes.
//! They uniquely identify all objects in Git (blobs, trees, commits, tags).
//!
//! ## Format
//!
//! - Full: 40 hex characters (e.g., "abc123...def")
//! - Short: First 7 characters (e.g., "abc1234")
//! - Raw: 20 bytes, as embedded in tree entries, index entries and packfiles
//!
//! ## Storage
//!
//! Objects are stored in `.git/objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_LENGTH, RAW_OBJECT_ID_LENGTH};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

/// Git object identifier (SHA-1 hash)
///
/// Always stored in lowercase hexadecimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an object ID from a string
    ///
    /// Upper-case hex digits are accepted and normalized.
    pub fn try_parse(id: String) -> anyhow::Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            return Err(anyhow::anyhow!("Invalid object ID length: {}", id.len()));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow::anyhow!("Invalid object ID characters: {}", id));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Hash of `data`, which must already carry its `<type> <size>\0` header
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha1::digest(data);
        Self::from_raw_bytes(digest.as_slice())
    }

    /// Build an object ID from its 20 raw bytes
    pub fn from_raw_bytes(bytes: &[u8]) -> Self {
        let hex40 = bytes
            .iter()
            .take(RAW_OBJECT_ID_LENGTH)
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        Self(hex40)
    }

    /// The 20 raw bytes of the hash
    pub fn to_raw_bytes(&self) -> anyhow::Result<[u8; RAW_OBJECT_ID_LENGTH]> {
        let mut bytes = [0u8; RAW_OBJECT_ID_LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&self.0[2 * i..2 * i + 2], 16)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid hex digit"))?;
        }
        Ok(bytes)
    }

    /// Write the object ID in binary format (20 bytes)
    ///
    /// Used when serializing tree objects and index entries.
    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(&self.to_raw_bytes()?)?;
        Ok(())
    }

    /// Read an object ID from binary format (20 bytes)
    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut buffer = [0u8; RAW_OBJECT_ID_LENGTH];
        reader.read_exact(&mut buffer)?;

        Ok(Self::from_raw_bytes(&buffer))
    }

    /// Whether this is the all-zero ID servers use for "no object"
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Convert to file system path for object storage
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first 2 chars.
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hash (standard Git abbreviation)
    pub fn to_short_oid(&self) -> String {
        self.0.split_at(7).0.to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn hashing_the_empty_blob_yields_the_well_known_id() {
        let oid = ObjectId::hash(b"blob 0\0");
        assert_eq!(oid.as_ref(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(oid.to_short_oid(), "e69de29");
        assert_eq!(
            oid.to_path(),
            PathBuf::from("e6").join("9de29bb2d1d6434b8b29ae775ad8c2e48c5391")
        );
    }

    #[test]
    fn upper_case_ids_are_normalized() {
        let oid =
            ObjectId::try_parse("E69DE29BB2D1D6434B8B29AE775AD8C2E48C5391".to_string()).unwrap();
        assert_eq!(oid.as_ref(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(ObjectId::try_parse("abc".to_string()).is_err());
        assert!(ObjectId::try_parse("z".repeat(40)).is_err());
    }

    proptest! {
        #[test]
        fn raw_bytes_survive_the_hex_form(bytes in proptest::collection::vec(any::<u8>(), 20)) {
            let oid = ObjectId::from_raw_bytes(&bytes);
            prop_assert_eq!(oid.to_raw_bytes().unwrap().to_vec(), bytes);
        }
    }
}
