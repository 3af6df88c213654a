//! Collaborator traits consumed by the retention scanner.

mod refs;
mod retention;

pub use refs::RefProvider;
pub use retention::RetentionStore;
