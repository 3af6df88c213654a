//! Git operations.
//!
//! Reads branch and tag topology from repositories on disk.

mod refs;

pub use refs::GitRefProvider;
