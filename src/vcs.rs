//! Version control operations used by tracking branches.

mod git;
#[cfg(test)]
pub(crate) mod mock;
mod state;

use std::path::Path;

pub use git::GitRepo;
pub use state::RepoState;

use crate::error::Result;

/// Prefix shared by every tracking branch
pub const TRACKING_PREFIX: &str = "gpremotes";

/// Name of the tracking branch for `remote` on local branch `branch`
pub fn tracking_branch_name(remote: &str, branch: &str) -> String {
    format!("{}/{}/{}", TRACKING_PREFIX, remote, branch)
}

/// Split a tracking branch name into (remote, branch)
pub fn parse_tracking_branch(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(TRACKING_PREFIX)?.strip_prefix('/')?;
    let (remote, branch) = rest.split_once('/')?;
    if remote.is_empty() || branch.is_empty() {
        return None;
    }
    Some((remote, branch))
}

/// The version control operations gitpub needs from the local repository.
///
/// Paths are relative to [`root`](Self::root).
pub trait VersionControl {
    /// Top of the working tree
    fn root(&self) -> &Path;

    fn current_branch(&self) -> Result<String>;

    fn list_branches(&self) -> Result<Vec<String>>;

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.list_branches()?.iter().any(|b| b == branch))
    }

    /// Create `branch` at the current commit without switching to it
    fn create_branch(&self, branch: &str) -> Result<()>;

    /// Switch to `branch`; a no-op when it is already checked out
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Merge `branch` into the current branch
    fn merge(&self, branch: &str) -> Result<()>;

    /// Stage paths for the next commit
    fn add(&self, paths: &[&str]) -> Result<()>;

    /// Rename a tracked file
    fn mv(&self, old: &str, new: &str) -> Result<()>;

    /// Commit the index and return the new commit id
    fn commit(&self, message: &str) -> Result<String>;

    fn has_staged_changes(&self) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_branch_names() {
        let name = tracking_branch_name("blog", "master");
        assert_eq!(name, "gpremotes/blog/master");
        assert_eq!(parse_tracking_branch(&name), Some(("blog", "master")));
        assert_eq!(
            parse_tracking_branch("gpremotes/blog/feature/x"),
            Some(("blog", "feature/x"))
        );
        assert_eq!(parse_tracking_branch("master"), None);
        assert_eq!(parse_tracking_branch("gpremotes/blog"), None);
        assert_eq!(parse_tracking_branch("gpremotesx/blog/master"), None);
    }
}
