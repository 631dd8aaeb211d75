//! Packfile parsing
//!
//! ```text
//! "PACK" | version (2 or 3) | object count | entries... | SHA-1 of everything before
//! ```
//!
//! Each entry starts with a type and inflated size varint, followed for deltas by
//! their base (a negative offset for `OFS_DELTA`, an object id for `REF_DELTA`),
//! then a zlib stream.

use crate::artifacts::objects::RAW_OBJECT_ID_LENGTH;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::raw::RawObject;
use crate::transport::TransportError;
use crate::transport::delta::apply_delta;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::{Cursor, Read};

const PACK_SIGNATURE: &[u8; 4] = b"PACK";
const PACK_HEADER_SIZE: usize = 12;

const OBJ_COMMIT: u8 = 1;
const OBJ_TREE: u8 = 2;
const OBJ_BLOB: u8 = 3;
const OBJ_TAG: u8 = 4;
const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

fn corrupt(message: impl Into<String>) -> TransportError {
    TransportError::CorruptPack(message.into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    Base(ObjectType),
    OfsDelta { base_offset: usize },
    RefDelta { base: ObjectId },
}

#[derive(Debug, Clone)]
struct PackEntry {
    offset: usize,
    kind: EntryKind,
    data: Bytes,
}

/// An object taken out of a pack, deltas already applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackObject {
    pub oid: ObjectId,
    pub object: RawObject,
}

#[derive(Debug, Clone)]
pub struct PackFile {
    version: u32,
    entries: Vec<PackEntry>,
}

impl PackFile {
    pub fn parse(pack: &[u8]) -> Result<Self, TransportError> {
        if pack.len() < PACK_HEADER_SIZE + RAW_OBJECT_ID_LENGTH {
            return Err(corrupt(format!("pack of {} bytes is too short", pack.len())));
        }

        let (body, trailer) = pack.split_at(pack.len() - RAW_OBJECT_ID_LENGTH);
        let checksum = Sha1::digest(body);
        if checksum.as_slice() != trailer {
            return Err(corrupt("trailing checksum does not match"));
        }

        let mut header = Cursor::new(body);
        let mut signature = [0u8; 4];
        header.read_exact(&mut signature).map_err(|_| corrupt("truncated header"))?;
        if &signature != PACK_SIGNATURE {
            return Err(corrupt("missing PACK signature"));
        }
        let version = header
            .read_u32::<BigEndian>()
            .map_err(|_| corrupt("truncated header"))?;
        if version != 2 && version != 3 {
            return Err(corrupt(format!("unsupported pack version {version}")));
        }
        let count = header
            .read_u32::<BigEndian>()
            .map_err(|_| corrupt("truncated header"))?;

        // every entry takes at least two bytes
        let mut entries = Vec::with_capacity((count as usize).min(body.len() / 2));
        let mut position = PACK_HEADER_SIZE;
        for _ in 0..count {
            let (entry, next) = Self::read_entry(body, position)?;
            entries.push(entry);
            position = next;
        }
        if position != body.len() {
            return Err(corrupt(format!(
                "{} unexpected bytes after the last object",
                body.len() - position
            )));
        }

        Ok(PackFile { version, entries })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read_entry(body: &[u8], offset: usize) -> Result<(PackEntry, usize), TransportError> {
        let mut position = offset;
        let next_byte = |position: &mut usize| {
            let byte = body
                .get(*position)
                .copied()
                .ok_or_else(|| corrupt(format!("truncated entry at offset {offset}")));
            *position += 1;
            byte
        };

        let mut byte = next_byte(&mut position)?;
        let type_code = (byte >> 4) & 0x07;
        let mut size = (byte & 0x0f) as usize;
        let mut shift = 4;
        while byte & 0x80 != 0 {
            byte = next_byte(&mut position)?;
            if shift > 57 {
                return Err(corrupt(format!("size overflows at offset {offset}")));
            }
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
        }

        let kind = match type_code {
            OBJ_COMMIT => EntryKind::Base(ObjectType::Commit),
            OBJ_TREE => EntryKind::Base(ObjectType::Tree),
            OBJ_BLOB => EntryKind::Base(ObjectType::Blob),
            OBJ_TAG => EntryKind::Base(ObjectType::Tag),
            OBJ_OFS_DELTA => {
                let mut byte = next_byte(&mut position)?;
                let mut distance = (byte & 0x7f) as usize;
                while byte & 0x80 != 0 {
                    byte = next_byte(&mut position)?;
                    distance = ((distance + 1) << 7) | (byte & 0x7f) as usize;
                }
                let base_offset = offset.checked_sub(distance).ok_or_else(|| {
                    corrupt(format!("delta base before the start of the pack at {offset}"))
                })?;
                EntryKind::OfsDelta { base_offset }
            }
            OBJ_REF_DELTA => {
                let raw = body
                    .get(position..position + RAW_OBJECT_ID_LENGTH)
                    .ok_or_else(|| corrupt(format!("truncated delta base at {offset}")))?;
                position += RAW_OBJECT_ID_LENGTH;
                EntryKind::RefDelta {
                    base: ObjectId::from_raw_bytes(raw),
                }
            }
            other => return Err(corrupt(format!("invalid object type {other} at {offset}"))),
        };

        let mut decoder = flate2::bufread::ZlibDecoder::new(&body[position..]);
        let mut data = Vec::with_capacity(size.min(body.len() - position));
        (&mut decoder)
            .take(size as u64 + 1)
            .read_to_end(&mut data)
            .map_err(|error| corrupt(format!("bad zlib stream at {offset}: {error}")))?;
        if data.len() != size {
            return Err(corrupt(format!(
                "entry at {offset} inflates to {} bytes, header says {size}",
                data.len()
            )));
        }
        position += decoder.total_in() as usize;

        Ok((
            PackEntry {
                offset,
                kind,
                data: data.into(),
            },
            position,
        ))
    }

    /// Every object in the pack with deltas applied
    ///
    /// `lookup` supplies `REF_DELTA` bases that are not in the pack, such as
    /// objects already in the store.
    pub fn resolve<F>(self, lookup: F) -> Result<Vec<PackObject>, TransportError>
    where
        F: Fn(&ObjectId) -> Option<RawObject>,
    {
        let by_offset: HashMap<usize, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.offset, index))
            .collect();
        let mut by_oid: HashMap<ObjectId, usize> = HashMap::new();
        let mut resolved: Vec<Option<PackObject>> = vec![None; self.entries.len()];
        let mut remaining = self.entries.len();

        while remaining > 0 {
            let before = remaining;

            for (index, entry) in self.entries.iter().enumerate() {
                if resolved[index].is_some() {
                    continue;
                }

                let object = match &entry.kind {
                    EntryKind::Base(object_type) => {
                        Some(RawObject::new(*object_type, entry.data.clone()))
                    }
                    EntryKind::OfsDelta { base_offset } => {
                        let base_index = by_offset.get(base_offset).ok_or_else(|| {
                            corrupt(format!(
                                "no object at delta base offset {base_offset} for entry at {}",
                                entry.offset
                            ))
                        })?;
                        resolved[*base_index]
                            .as_ref()
                            .map(|base| Self::apply(&base.object, &entry.data))
                            .transpose()?
                    }
                    EntryKind::RefDelta { base } => {
                        let in_pack = by_oid
                            .get(base)
                            .and_then(|base_index| resolved[*base_index].as_ref())
                            .map(|base| base.object.clone());
                        in_pack
                            .or_else(|| lookup(base))
                            .map(|base| Self::apply(&base, &entry.data))
                            .transpose()?
                    }
                };

                if let Some(object) = object {
                    let oid = object
                        .object_id()
                        .map_err(|error| corrupt(error.to_string()))?;
                    by_oid.insert(oid.clone(), index);
                    resolved[index] = Some(PackObject { oid, object });
                    remaining -= 1;
                }
            }

            if remaining == before {
                return Err(corrupt(format!(
                    "{remaining} deltas reference bases that are neither in the pack nor in the store"
                )));
            }
        }

        Ok(resolved.into_iter().flatten().collect())
    }

    fn apply(base: &RawObject, delta: &[u8]) -> Result<RawObject, TransportError> {
        let content = apply_delta(base.content(), delta)?;
        Ok(RawObject::new(base.object_type(), content.into()))
    }
}
