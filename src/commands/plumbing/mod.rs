//! Plumbing commands (low-level Git operations)
//!
//! Plumbing commands give direct access to the object store and the working
//! directory. Porcelain commands are built on top of them.
//!
//! ## Commands
//!
//! - `hash-object`: Compute a blob id and optionally store the blob
//! - `cat-file`: Show the type and body of an object
//! - `ls-tree`: List every file of a tree or commit
//! - `write-tree`: Store the index as trees
//! - working-directory file I/O (`setup`, `ls`, `read`, `write`)

pub mod cat_file;
pub mod fs_ops;
pub mod hash_object;
pub mod ls_tree;
pub mod write_tree;
