//! Moving the working tree and index from one commit to another
//!
//! Every change is planned and checked for conflicts with local work before the
//! first file is written.

pub mod conflict;
pub mod migration;
