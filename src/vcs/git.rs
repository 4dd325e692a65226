use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use super::VersionControl;
use crate::error::{Error, Result};

/// A git working tree, driven through the `git` command line
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GitRepo { root: root.into() }
    }

    /// Find the repository containing `start` by walking up to the first
    /// directory holding `.git`
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start
            .canonicalize()
            .map_err(|e| Error::io(start, e))?;
        start
            .ancestors()
            .find(|dir| dir.join(".git").exists())
            .map(GitRepo::new)
            .ok_or_else(|| Error::NotARepository(start.clone()))
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        tracing::debug!("Running git {}", args.join(" "));
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::io(&self.root, e))
    }

    /// Run git, failing on a non-zero exit, and return its trimmed stdout
    fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(Error::VersionControlCommandFailed {
                command: format!("git {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControl for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<String> {
        self.run_checked(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        let stdout = self.run_checked(&["branch", "--format=%(refname:short)"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        self.run_checked(&["branch", branch])?;
        tracing::info!("Created branch {}", branch);
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if self.current_branch()? == branch {
            return Ok(());
        }
        self.run_checked(&["checkout", "--quiet", branch])?;
        tracing::debug!("Checked out {}", branch);
        Ok(())
    }

    fn merge(&self, branch: &str) -> Result<()> {
        self.run_checked(&["merge", "--no-edit", branch])?;
        Ok(())
    }

    fn add(&self, paths: &[&str]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run_checked(&args)?;
        Ok(())
    }

    fn mv(&self, old: &str, new: &str) -> Result<()> {
        self.run_checked(&["mv", old, new])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.run_checked(&["commit", "--quiet", "-m", message])?;
        let commit = self.run_checked(&["rev-parse", "HEAD"])?;
        tracing::debug!("Committed {}", commit);
        Ok(commit)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        // `git diff --cached --quiet` exits 1 when the index differs from HEAD
        let output = self.run(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Error::VersionControlCommandFailed {
                command: "git diff --cached --quiet".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}
