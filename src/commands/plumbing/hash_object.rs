use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::Path;

impl Repository {
    /// Blob id of a working file, stored in the database when `write` is set
    pub fn hash_object(&self, file_path: &Path, write: bool) -> anyhow::Result<ObjectId> {
        let file_path = self.workspace().relative(file_path)?;
        let blob = self.workspace().parse_blob(&file_path)?;

        if !write {
            return blob.object_id();
        }

        self.database().store(&blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{FileSystem, MemoryFs};
    use std::sync::Arc;

    #[tokio::test]
    async fn hashing_without_write_leaves_the_database_alone() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        let repository = Repository::new(fs.clone(), "/repo").unwrap();
        repository.write_file(Path::new("hello.txt"), "hello\n").unwrap();

        let oid = repository.hash_object(Path::new("hello.txt"), false).unwrap();
        assert_eq!(oid.as_ref(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(!repository.database().exists(&oid));

        let stored = repository
            .hash_object(Path::new("/repo/hello.txt"), true)
            .unwrap();
        assert_eq!(stored, oid);
        assert!(repository.database().exists(&oid));
    }
}
