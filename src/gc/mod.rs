//! Retention decision engine.
//!
//! This module decides which completed uploads are still protected by a
//! retention policy and which have expired.
//!
//! # Overview
//!
//! The [`UploadExpirer`] selects the repositories due for a scan, merges
//! their policies with the global ones and evaluates every completed upload
//! oldest first. Evaluation is two-phase:
//!
//! - **Fast path**: match policies against the commit hash and the
//!   branches/tags whose tip is that commit, using reference data fetched
//!   once per repository
//! - **Slow path**: for policies retaining intermediate commits, match
//!   against every branch containing the commit, queried on demand
//!
//! Facts learned along the way are kept in a [`RepositoryCache`] that lives
//! for one repository scan only.
//!
//! # Example
//!
//! ```rust,ignore
//! use codeintel_retention::gc::{run_upload_expirer, ExpirerConfig, UploadExpirer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let expirer = Arc::new(UploadExpirer::new(store, refs, config));
//! let token = CancellationToken::new();
//!
//! // Runs until the token is cancelled
//! run_upload_expirer(expirer, token.clone()).await;
//! ```

mod cache;
mod expirer;
mod matcher;
mod patterns;
mod protection;
mod worker;

pub use cache::{BRANCHES_CONTAINING_CAPACITY, RepositoryCache};
pub use expirer::{ExpirerConfig, ExpirerRunSummary, UploadExpirer};
pub use matcher::{contains_policy_matches, tip_policy_matches};
pub use patterns::CompiledPatterns;
pub use protection::{ProtectionEvaluator, ScanContext, VISIBLE_COMMITS_PAGE_SIZE};
pub use worker::run_upload_expirer;
