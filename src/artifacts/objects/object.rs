use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::raw::RawObject;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use std::io::BufRead;
use std::path::PathBuf;

pub trait Packable {
    /// Full loose-object representation, header included
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    /// Parse the object content (the header has already been consumed)
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(ObjectId::hash(&content))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Prefix `content` with the `<type> <size>\0` header
pub fn with_header(object_type: ObjectType, content: &[u8]) -> Bytes {
    let header = format!("{} {}\0", object_type.as_str(), content.len());

    let mut object_bytes = Vec::with_capacity(header.len() + content.len());
    object_bytes.extend_from_slice(header.as_bytes());
    object_bytes.extend_from_slice(content);

    Bytes::from(object_bytes)
}

pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    Tag(Box<RawObject>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
            ObjectBox::Tag(tag) => tag.display(),
        }
    }
}
