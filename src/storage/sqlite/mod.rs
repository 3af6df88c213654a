//! `SQLite` retention store.
//!
//! ## Module Structure
//!
//! - [`connection`]: connection locking and pragma configuration
//! - `schema`: idempotent table definitions
//! - `store`: the [`SqliteRetentionStore`] itself
//!
//! ## Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `retention_policies` | Global (`repository_id IS NULL`) and repository policies |
//! | `uploads` | Upload records, scan timestamps and expired flags |
//! | `upload_visible_commits` | Commits each upload is visible from |
//! | `repository_retention_scans` | Rotating cursor of repository scans |

pub mod connection;
mod schema;
mod store;

pub use connection::{acquire_lock, configure_connection};
pub use store::SqliteRetentionStore;
