use super::VersionControl;
use crate::error::{Error, Result};

/// The branch checked out before gitpub switched to a tracking branch.
///
/// Restoring consumes the state, so it can only happen once.
#[derive(Debug)]
#[must_use = "a captured RepoState should be restored"]
pub struct RepoState {
    branch: String,
}

impl RepoState {
    pub fn capture(vcs: &dyn VersionControl) -> Result<Self> {
        Ok(RepoState {
            branch: vcs.current_branch()?,
        })
    }

    /// Check the captured branch back out
    pub fn restore(self, vcs: &dyn VersionControl) -> Result<()> {
        tracing::debug!("Restoring branch {}", self.branch);
        vcs.checkout(&self.branch)
    }

    /// Restore the captured branch after `result`, keeping the original error
    /// if both fail. A failed commit is left on the branch it happened on.
    pub fn restore_after<T>(self, vcs: &dyn VersionControl, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.restore(vcs)?;
                Ok(value)
            }
            Err(e @ Error::CommitFailed(_)) => {
                tracing::warn!("Not restoring {} after failed commit", self.branch);
                Err(e)
            }
            Err(e) => {
                if let Err(restore_err) = self.restore(vcs) {
                    tracing::warn!("Failed to restore original branch: {}", restore_err);
                }
                Err(e)
            }
        }
    }
}
