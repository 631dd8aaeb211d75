//! Working tree status inspection
//!
//! Every path is compared across three trees: the HEAD commit, the working directory
//! and the index (stage).
//!
//! ## Components
//!
//! - `file_status`: the per-file status vocabulary and status-matrix rows
//! - `inspector`: reads the three states of a path, hashing working files only when
//!   their stat data no longer matches the index
//! - `status_info`: walks every known path and builds the status matrix

pub mod file_status;
pub mod inspector;
pub mod status_info;
