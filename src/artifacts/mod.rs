//! Git data structures and algorithms
//!
//! - `branch`: branch names and revision resolution
//! - `checkout`: working tree migration between two trees
//! - `core`: terminal output (pager)
//! - `database`: tree entry type
//! - `index`: index entry, header, checksum and file modes
//! - `log`: commit history traversal
//! - `objects`: object types (blob, tree, commit, raw tag)
//! - `status`: per-file status and the status matrix

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod index;
pub mod log;
pub mod objects;
pub mod status;
