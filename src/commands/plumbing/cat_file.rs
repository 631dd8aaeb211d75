use crate::areas::repository::Repository;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use serde::Serialize;

/// An object as shown by `cat-file -p`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatFile {
    pub oid: ObjectId,
    #[serde(serialize_with = "serialize_type")]
    pub object_type: ObjectType,
    pub size: usize,
    pub content: String,
}

fn serialize_type<S: serde::Serializer>(object_type: &ObjectType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(object_type.as_str())
}

impl Repository {
    /// Object named by a ref or a full or abbreviated id, without peeling
    pub fn resolve_object(&self, name: &str) -> anyhow::Result<ObjectId> {
        if let Some(oid) = self.refs().resolve(name)? {
            return Ok(oid);
        }

        let is_hex = (4..=OBJECT_ID_LENGTH).contains(&name.len())
            && name.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex {
            anyhow::bail!("Not a valid object name {name}");
        }

        let mut matches = self.database().find_objects_by_prefix(name)?;
        match matches.len() {
            0 => anyhow::bail!("Not a valid object name {name}"),
            1 => Ok(matches.remove(0)),
            _ => anyhow::bail!("short object id {name} is ambiguous"),
        }
    }

    pub fn cat_file(&self, name: &str) -> anyhow::Result<CatFile> {
        let oid = self.resolve_object(name)?;
        let object = self.database().parse_object(&oid)?;
        let raw = self.database().load_raw(&oid)?;

        Ok(CatFile {
            oid,
            object_type: object.object_type(),
            size: raw.content().len(),
            content: object.display(),
        })
    }
}
