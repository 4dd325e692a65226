pub mod checkout;
pub mod commit;
pub mod remote;
pub mod stage;
pub mod status;
pub mod sync;

use std::path::Path;

use anyhow::{Context as _, Result};
use gitpub::{
    config::GitpubConfig,
    document,
    tracking::TrackingBranch,
    vcs::{GitRepo, RepoState, VersionControl},
};

/// What every command needs: the repository and the configuration
pub struct Context {
    pub vcs: GitRepo,
    pub config: GitpubConfig,
}

impl Context {
    /// Locate the repository containing the current directory
    pub fn discover(config: GitpubConfig) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let vcs = GitRepo::discover(&cwd)?;
        tracing::debug!("Using repository at {:?}", vcs.root());
        Ok(Context { vcs, config })
    }

    /// Repository-relative form of a path given on the command line
    pub fn relative(&self, path: &Path) -> Result<String> {
        Ok(document::repo_relative(self.vcs.root(), path)?)
    }

    /// Run `f` on a tracking branch: the one for `remote` (checked out for
    /// the duration), or the current one when no remote is named
    pub fn with_tracking_branch<T, F>(
        &self,
        remote: Option<&str>,
        branch: Option<&str>,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut TrackingBranch<'_>) -> gitpub::Result<T>,
    {
        let Some(remote) = remote else {
            let mut tb = TrackingBranch::current(&self.vcs, &self.config)?;
            return Ok(f(&mut tb)?);
        };

        let branch = branch.unwrap_or(&self.config.default_branch);
        let state = RepoState::capture(&self.vcs)?;
        let result = TrackingBranch::open(&self.vcs, &self.config, remote, branch, true)
            .and_then(|mut tb| f(&mut tb));

        Ok(state.restore_after(&self.vcs, result)?)
    }
}
