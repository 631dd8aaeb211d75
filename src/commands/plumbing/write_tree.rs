use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;

impl Repository {
    /// Store the index as trees and return the root tree id
    pub async fn write_tree(&self) -> anyhow::Result<ObjectId> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        self.store_index_trees(&index)
    }

    /// Nested trees are stored before the trees that embed them
    pub(crate) fn store_index_trees(&self, index: &Index) -> anyhow::Result<ObjectId> {
        let tree = Tree::build(index.entries())?;
        let store_tree = &|tree: &Tree| self.database().store(tree).map(|_| ());
        tree.traverse(store_tree)?;

        tree.object_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{FileSystem, MemoryFs};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_index_writes_the_empty_tree() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        let repository = Repository::new(fs, "/repo").unwrap();

        let oid = repository.write_tree().await.unwrap();
        assert_eq!(oid.as_ref(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert!(repository.database().exists(&oid));
    }

    #[tokio::test]
    async fn nested_directories_become_subtrees() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        let repository = Repository::new(fs, "/repo").unwrap();
        repository.write_file(Path::new("hello.txt"), "hello\n").unwrap();
        repository.write_file(Path::new("src/lib.rs"), "").unwrap();
        repository.add(&[PathBuf::from(".")]).await.unwrap();

        let root = repository.write_tree().await.unwrap();
        let files = repository.database().flatten_tree(&root).unwrap();

        assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("hello.txt"), PathBuf::from("src/lib.rs")]
        );
        assert_eq!(
            files[Path::new("src/lib.rs")].oid.as_ref(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }
}
