//! moonwalk: a git core over a virtual filesystem
//!
//! - `vfs`: path-addressed byte storage (in-memory with a snapshot file, or a host directory)
//! - `areas`: the parts of a repository (object database, index, refs, config, workspace)
//! - `artifacts`: git data types and algorithms
//! - `transport`: smart HTTP clone client
//! - `commands`: repository operations, plumbing and porcelain

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod transport;
pub mod vfs;
