use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use super::VersionControl;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub current: String,
    pub branches: Vec<String>,
    /// Every mutating call, in order
    pub log: Vec<String>,
    /// path -> content, for index entries that differ from the last commit
    pub staged: BTreeMap<String, Vec<u8>>,
    pub committed: BTreeMap<String, Vec<u8>>,
    pub commits: usize,
    pub fail_commit: bool,
    pub fail_merge: bool,
    /// `add` of this path fails
    pub fail_add: Option<String>,
}

/// In-memory stand-in for a git repository; files still live under `root`
pub(crate) struct MockVcs {
    root: PathBuf,
    pub state: RefCell<MockState>,
}

impl MockVcs {
    pub fn new(root: &Path, branch: &str) -> Self {
        MockVcs {
            root: root.to_path_buf(),
            state: RefCell::new(MockState {
                current: branch.to_string(),
                branches: vec![branch.to_string()],
                ..Default::default()
            }),
        }
    }

    pub fn current(&self) -> String {
        self.state.borrow().current.clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    fn failed(command: &str) -> Error {
        Error::VersionControlCommandFailed {
            command: command.to_string(),
            status: "exit status: 1".to_string(),
            stderr: "mock failure".to_string(),
        }
    }
}

impl VersionControl for MockVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current())
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().branches.clone())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.branches.push(branch.to_string());
        state.log.push(format!("branch {}", branch));
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.current == branch {
            return Ok(());
        }
        if !state.branches.iter().any(|b| b == branch) {
            return Err(Self::failed("git checkout"));
        }
        state.current = branch.to_string();
        state.log.push(format!("checkout {}", branch));
        Ok(())
    }

    fn merge(&self, branch: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_merge {
            return Err(Self::failed("git merge"));
        }
        state.log.push(format!("merge {}", branch));
        Ok(())
    }

    fn add(&self, paths: &[&str]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for path in paths {
            if state.fail_add.as_deref() == Some(*path) {
                return Err(Self::failed("git add"));
            }
            let full = self.root.join(path);
            let content = fs::read(&full).map_err(|e| Error::io(full, e))?;
            if state.committed.get(*path) == Some(&content) {
                state.staged.remove(*path);
            } else {
                state.staged.insert(path.to_string(), content);
            }
        }
        Ok(())
    }

    fn mv(&self, old: &str, new: &str) -> Result<()> {
        fs::rename(self.root.join(old), self.root.join(new))
            .map_err(|e| Error::io(self.root.join(old), e))?;
        self.state.borrow_mut().log.push(format!("mv {} {}", old, new));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut state = self.state.borrow_mut();
        if state.fail_commit || state.staged.is_empty() {
            return Err(Self::failed("git commit"));
        }
        let staged = std::mem::take(&mut state.staged);
        state.committed.extend(staged);
        state.commits += 1;
        state.log.push(format!("commit {}", message));
        Ok(format!("c{}", state.commits))
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Ok(!self.state.borrow().staged.is_empty())
    }
}
