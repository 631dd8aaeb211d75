//! Operations exposed on [`Repository`](crate::areas::repository::Repository)
//!
//! - `plumbing`: object-level tools (hash-object, cat-file, ls-tree, write-tree) and
//!   raw file access in the virtual working directory
//! - `porcelain`: init, add, remove, commit, status, log, checkout and clone

pub mod plumbing;
pub mod porcelain;
