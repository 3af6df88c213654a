//! Data models for retention scanning.
//!
//! This module contains the core data structures shared by the scanner,
//! the storage layer and the git reference provider.

mod policy;
mod refs;
mod upload;

pub use policy::{PolicyKind, PolicyScope, RetentionPolicy};
pub use refs::{RefDescription, RefDescriptions, RefKind};
pub use upload::{Upload, UploadState};

/// Identifier of a repository.
pub type RepositoryId = i64;

/// Identifier of an upload.
pub type UploadId = i64;
