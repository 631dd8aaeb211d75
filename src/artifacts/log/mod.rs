//! Commit history traversal
//!
//! - `rev_list`: walks the commit graph newest first by committer time
//! - `log_entry`: the per-commit record `log` returns and serializes

pub mod log_entry;
pub mod rev_list;
