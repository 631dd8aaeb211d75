//! Core repository components
//!
//! This module contains the fundamental building blocks of a Git repository:
//!
//! - `database`: Object database for storing blobs, trees, commits and tags
//! - `index`: Staging area (index/cache) for tracking file changes
//! - `refs`: Reference management (HEAD, branches, remote-tracking refs, tags, shallow list)
//! - `config`: The repository's `.git/config`
//! - `repository`: High-level repository operations and coordination
//! - `workspace`: Working directory operations on the virtual filesystem

pub mod config;
pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
