use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Parse the `<type> <size>\0` header of a loose object
    ///
    /// Leaves the reader positioned at the start of the object content.
    pub fn parse_object_header(data_reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;

        let object_type = String::from_utf8(object_type)?;
        let object_type = ObjectType::try_from(object_type.trim())?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            anyhow::bail!("Invalid object header: missing NUL after size");
        }
        let size = std::str::from_utf8(&size)?
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("Invalid object header: bad size"))?;

        Ok((object_type, size))
    }

    pub fn parse_object_type(data_reader: &mut impl BufRead) -> anyhow::Result<ObjectType> {
        Ok(Self::parse_object_header(data_reader)?.0)
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(anyhow::anyhow!("Invalid object type: {value}")),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn header_parsing_leaves_the_content_in_the_reader() {
        let mut reader = Cursor::new(b"commit 11\0tree abcdef".to_vec());

        let (object_type, size) = ObjectType::parse_object_header(&mut reader).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();

        assert_eq!(object_type, ObjectType::Commit);
        assert_eq!(size, 11);
        assert_eq!(rest, "tree abcdef");
    }

    #[test]
    fn unknown_types_are_rejected() {
        let mut reader = Cursor::new(b"note 1\0x".to_vec());
        assert!(ObjectType::parse_object_header(&mut reader).is_err());
    }
}
