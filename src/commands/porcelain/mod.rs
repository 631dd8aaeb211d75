//! Porcelain commands, one per button of the browser client
//!
//! - `init`: lay out `.git`
//! - `add` / `remove`: stage and unstage paths
//! - `commit`: record the index on top of HEAD
//! - `status`: per-file status and the status matrix
//! - `log`: history walk
//! - `checkout`: move the working tree, index and HEAD
//! - `clone`: fetch a remote over smart HTTP

pub mod add;
pub mod checkout;
pub mod clone;
pub mod commit;
pub mod init;
pub mod log;
pub mod remove;
pub mod status;
