//! Storage layer.
//!
//! The retention scanner consumes two collaborators:
//! - **[`RetentionStore`]**: upload records, policies and the scan cursor
//! - **[`RefProvider`]**: git branch/tag topology
//!
//! [`SqliteRetentionStore`] is the bundled store; the bundled reference
//! provider lives in [`crate::git`].

// Dropping the connection guard a statement early provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteRetentionStore;
pub use traits::{RefProvider, RetentionStore};
