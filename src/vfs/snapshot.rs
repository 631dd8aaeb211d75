//! Snapshot codec for [`MemoryFs`](crate::vfs::MemoryFs)
//!
//! ```text
//! "MWFS" | version u32 | node count u32 | next inode u64
//! per node: kind u8 | mode u32 | ino u64 | mtime i64 u32 | ctime i64 u32
//!           | path len u32 | path | data len u32 | data
//! SHA-1 of everything above
//! ```
//!
//! The whole image is zlib-compressed.

use crate::vfs::FsError;
use crate::vfs::memory::{Node, NodeKind, Tree};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

const SIGNATURE: &[u8; 4] = b"MWFS";
const VERSION: u32 = 1;
const CHECKSUM_SIZE: usize = 20;

const KIND_DIRECTORY: u8 = 0;
const KIND_FILE: u8 = 1;

pub(crate) fn encode(tree: &Tree) -> Result<Vec<u8>, FsError> {
    let mut image = Vec::new();
    image.write_all(SIGNATURE)?;
    image.write_u32::<NetworkEndian>(VERSION)?;
    image.write_u32::<NetworkEndian>(length_u32(tree.nodes.len(), "node count")?)?;
    image.write_u64::<NetworkEndian>(tree.next_ino)?;

    for (path, node) in &tree.nodes {
        let (kind, data): (u8, &[u8]) = match &node.kind {
            NodeKind::Directory => (KIND_DIRECTORY, &[]),
            NodeKind::File(data) => (KIND_FILE, data),
        };
        let path = path.to_string_lossy();

        image.write_u8(kind)?;
        image.write_u32::<NetworkEndian>(node.mode)?;
        image.write_u64::<NetworkEndian>(node.ino)?;
        image.write_i64::<NetworkEndian>(node.mtime.0)?;
        image.write_u32::<NetworkEndian>(node.mtime.1)?;
        image.write_i64::<NetworkEndian>(node.ctime.0)?;
        image.write_u32::<NetworkEndian>(node.ctime.1)?;
        image.write_u32::<NetworkEndian>(length_u32(path.len(), &path)?)?;
        image.write_all(path.as_bytes())?;
        image.write_u32::<NetworkEndian>(length_u32(data.len(), &path)?)?;
        image.write_all(data)?;
    }

    let checksum = Sha1::digest(&image);
    image.write_all(checksum.as_slice())?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&image)?;
    Ok(encoder.finish()?)
}

/// Lengths are stored as u32; larger ones cannot be represented
fn length_u32(length: usize, what: &str) -> Result<u32, FsError> {
    u32::try_from(length)
        .map_err(|_| FsError::Corrupt(format!("{what} does not fit in a snapshot (length {length})")))
}

pub(crate) fn decode(compressed: &[u8]) -> Result<Tree, FsError> {
    let mut image = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut image)
        .map_err(|err| FsError::Corrupt(format!("cannot inflate snapshot: {err}")))?;

    if image.len() < SIGNATURE.len() + CHECKSUM_SIZE {
        return Err(FsError::Corrupt("snapshot is truncated".to_string()));
    }

    let (body, checksum) = image.split_at(image.len() - CHECKSUM_SIZE);
    if Sha1::digest(body).as_slice() != checksum {
        return Err(FsError::Corrupt(
            "checksum does not match the stored snapshot".to_string(),
        ));
    }

    let mut reader = Cursor::new(body);
    let mut signature = [0u8; 4];
    reader.read_exact(&mut signature).map_err(truncated)?;
    if &signature != SIGNATURE {
        return Err(FsError::Corrupt("bad snapshot signature".to_string()));
    }

    let version = reader.read_u32::<NetworkEndian>().map_err(truncated)?;
    if version != VERSION {
        return Err(FsError::Corrupt(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let count = reader.read_u32::<NetworkEndian>().map_err(truncated)?;
    let next_ino = reader.read_u64::<NetworkEndian>().map_err(truncated)?;

    let mut nodes = BTreeMap::new();
    for _ in 0..count {
        let (path, node) = read_node(&mut reader).map_err(truncated)?;
        nodes.insert(path, node?);
    }

    if !nodes.contains_key(&PathBuf::from("/")) {
        return Err(FsError::Corrupt("snapshot has no root directory".to_string()));
    }

    Ok(Tree { nodes, next_ino })
}

fn read_node(
    reader: &mut Cursor<&[u8]>,
) -> std::io::Result<(PathBuf, Result<Node, FsError>)> {
    let kind = reader.read_u8()?;
    let mode = reader.read_u32::<NetworkEndian>()?;
    let ino = reader.read_u64::<NetworkEndian>()?;
    let mtime = (
        reader.read_i64::<NetworkEndian>()?,
        reader.read_u32::<NetworkEndian>()?,
    );
    let ctime = (
        reader.read_i64::<NetworkEndian>()?,
        reader.read_u32::<NetworkEndian>()?,
    );

    let path_len = reader.read_u32::<NetworkEndian>()? as usize;
    let mut path = vec![0u8; path_len];
    reader.read_exact(&mut path)?;
    let path = PathBuf::from(String::from_utf8_lossy(&path).to_string());

    let data_len = reader.read_u32::<NetworkEndian>()? as usize;
    let mut data = vec![0u8; data_len];
    reader.read_exact(&mut data)?;

    let kind = match kind {
        KIND_DIRECTORY => Ok(NodeKind::Directory),
        KIND_FILE => Ok(NodeKind::File(Bytes::from(data))),
        other => Err(FsError::Corrupt(format!("unknown node kind {other}"))),
    };

    Ok((
        path,
        kind.map(|kind| Node {
            kind,
            mode,
            ino,
            mtime,
            ctime,
        }),
    ))
}

fn truncated(_: std::io::Error) -> FsError {
    FsError::Corrupt("snapshot ends unexpectedly".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{FileSystem, MemoryFs};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn lengths_past_u32_are_refused() {
        assert_eq!(length_u32(7, "a.txt").unwrap(), 7);

        let error = length_u32(u32::MAX as usize + 1, "/moonwalk/big.bin").unwrap_err();
        assert_eq!(error.code(), "ECORRUPT");
        assert!(error.to_string().contains("/moonwalk/big.bin"));
    }

    fn sample_tree() -> Tree {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("/moonwalk/.git/objects")).unwrap();
        fs.write_file(Path::new("/moonwalk/README.md"), b"# moonwalk\n")
            .unwrap();
        fs.write_file(Path::new("/moonwalk/bin.dat"), &[0, 159, 146, 150])
            .unwrap();

        let mut tree = Tree::default();
        for path in fs.walk_files(Path::new("/")).unwrap() {
            let stat = fs.stat(&path).unwrap();
            let data = fs.read_file(&path).unwrap();
            tree.nodes.insert(
                path,
                Node {
                    kind: NodeKind::File(data),
                    mode: stat.mode,
                    ino: stat.ino,
                    mtime: (stat.mtime, stat.mtime_nsec as u32),
                    ctime: (stat.ctime, stat.ctime_nsec as u32),
                },
            );
        }
        tree
    }

    #[test]
    fn decoding_an_encoded_tree_yields_the_same_nodes() {
        let tree = sample_tree();
        let image = encode(&tree).unwrap();

        assert_eq!(decode(&image).unwrap(), tree);
    }

    #[test]
    fn a_flipped_byte_is_reported_as_corruption() {
        let tree = sample_tree();
        let image = encode(&tree).unwrap();

        let mut raw = Vec::new();
        ZlibDecoder::new(&image[..]).read_to_end(&mut raw).unwrap();
        let middle = raw.len() / 2;
        raw[middle] ^= 0xff;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let tampered = encoder.finish().unwrap();

        let err = decode(&tampered).unwrap_err();
        assert!(matches!(err, FsError::Corrupt(_)));
    }

    #[test]
    fn garbage_is_not_a_snapshot() {
        let err = decode(b"definitely not zlib").unwrap_err();
        assert_eq!(err.code(), "ECORRUPT");
    }
}
