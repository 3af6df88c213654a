//! Reference topology read from on-disk repositories.

use crate::models::{RefDescription, RefDescriptions, RepositoryId};
use crate::storage::RefProvider;
use crate::{Error, Result};
use git2::{BranchType, ErrorCode, Oid, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Builds an error mapper for a named git operation.
fn git_failed(operation: &'static str) -> impl Fn(git2::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.message().to_string(),
    }
}

/// [`RefProvider`] backed by bare or non-bare clones under one directory.
///
/// Repository `42` is read from `<repos_root>/42`, falling back to
/// `<repos_root>/42.git`. Only local branches and tags are considered;
/// remote-tracking refs are ignored.
#[derive(Debug, Clone)]
pub struct GitRefProvider {
    repos_root: PathBuf,
}

impl GitRefProvider {
    /// Creates a provider reading repositories under `repos_root`.
    #[must_use]
    pub fn new(repos_root: impl AsRef<Path>) -> Self {
        Self {
            repos_root: repos_root.as_ref().to_path_buf(),
        }
    }

    /// Returns the directory holding the repositories.
    #[must_use]
    pub fn repos_root(&self) -> &Path {
        &self.repos_root
    }

    /// Resolves the on-disk location of a repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if neither candidate path exists.
    pub fn repository_path(&self, repository_id: RepositoryId) -> Result<PathBuf> {
        let plain = self.repos_root.join(repository_id.to_string());
        if plain.exists() {
            return Ok(plain);
        }

        let bare = self.repos_root.join(format!("{repository_id}.git"));
        if bare.exists() {
            return Ok(bare);
        }

        Err(Error::OperationFailed {
            operation: "resolve_repository".to_string(),
            cause: format!(
                "repository {repository_id} not found under {}",
                self.repos_root.display()
            ),
        })
    }

    fn open_repo(&self, repository_id: RepositoryId) -> Result<Repository> {
        let path = self.repository_path(repository_id)?;
        Repository::open(&path).map_err(git_failed("open_repository"))
    }
}

impl RefProvider for GitRefProvider {
    #[instrument(name = "retention.git.ref_descriptions", skip(self))]
    fn ref_descriptions(&self, repository_id: RepositoryId) -> Result<RefDescriptions> {
        let repo = self.open_repo(repository_id)?;
        let mut descriptions = RefDescriptions::new();

        for reference in repo.references().map_err(git_failed("list_references"))? {
            let reference = reference.map_err(git_failed("read_reference"))?;

            let description = match reference.shorthand() {
                Some(name) if reference.is_branch() => RefDescription::branch(name),
                Some(name) if reference.is_tag() => RefDescription::tag(name),
                _ => continue,
            };

            // Tags may point at trees or blobs; those tip no commit
            let Ok(commit) = reference.peel_to_commit() else {
                debug!(name = %description.name, "Skipping reference not pointing at a commit");
                continue;
            };

            descriptions
                .entry(commit.id().to_string())
                .or_default()
                .push(description);
        }

        for refs in descriptions.values_mut() {
            refs.sort_by(|a, b| a.name.cmp(&b.name));
        }

        debug!(commits = descriptions.len(), "Loaded reference descriptions");
        Ok(descriptions)
    }

    #[instrument(name = "retention.git.branches_containing", skip(self))]
    fn branches_containing(
        &self,
        repository_id: RepositoryId,
        commit: &str,
    ) -> Result<Vec<String>> {
        let repo = self.open_repo(repository_id)?;

        let Ok(target) = Oid::from_str(commit) else {
            debug!("Commit is not a valid object id");
            return Ok(Vec::new());
        };
        match repo.find_commit(target) {
            Ok(_) => {},
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(git_failed("find_commit")(e)),
        }

        let mut branches = Vec::new();
        for branch in repo
            .branches(Some(BranchType::Local))
            .map_err(git_failed("list_branches"))?
        {
            let (branch, _) = branch.map_err(git_failed("read_branch"))?;
            let Some(name) = branch.name().map_err(git_failed("branch_name"))? else {
                continue;
            };
            let tip = branch
                .get()
                .peel_to_commit()
                .map_err(git_failed("peel_branch"))?
                .id();

            let contains = tip == target
                || repo
                    .graph_descendant_of(tip, target)
                    .map_err(git_failed("graph_descendant_of"))?;
            if contains {
                branches.push(name.to_string());
            }
        }

        branches.sort();
        Ok(branches)
    }
}
