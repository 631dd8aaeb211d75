//! Objects kept as opaque bytes
//!
//! Packfiles deliver objects as `(type, content)` pairs. They are stored exactly as
//! received so their IDs stay stable even when the content would not survive a
//! parse/serialize round trip (annotated tags, commits with unusual headers).

use crate::artifacts::objects::object::{Object, Packable, with_header};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawObject {
    object_type: ObjectType,
    content: Bytes,
}

impl RawObject {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }
}

impl Packable for RawObject {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(with_header(self.object_type, &self.content))
    }
}

impl Object for RawObject {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }
}
