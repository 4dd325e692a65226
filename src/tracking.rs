//! Tracking branches: a remote's document map committed on its own branch.
//!
//! A tracking branch is named `gpremotes/<remote>/<branch>`. Changes to the
//! map are collected in a stage, a copy of the committed map, and folded
//! back in by [`TrackingBranch::commit`]. Every operation that checks out
//! the tracking branch puts the caller's branch back afterwards.

use std::collections::BTreeMap;

use crate::{
    adapter::RemoteSpec,
    binding::{PushReport, RemoteBinding},
    config::GitpubConfig,
    docmap::{DocRecord, DocumentMap},
    error::{Error, Result},
    vcs::{self, RepoState, VersionControl},
};

pub struct TrackingBranch<'a> {
    vcs: &'a dyn VersionControl,
    binding: RemoteBinding,
    branch: String,
    stage: Option<DocumentMap>,
}

impl<'a> TrackingBranch<'a> {
    /// Open the existing tracking branch for `remote` on `branch`, checking it
    /// out first if asked to
    pub fn open(
        vcs: &'a dyn VersionControl,
        config: &GitpubConfig,
        remote: &str,
        branch: &str,
        checkout: bool,
    ) -> Result<Self> {
        let name = vcs::tracking_branch_name(remote, branch);
        if !vcs.branch_exists(&name)? {
            return Err(Error::NoSuchRemoteBranch { branch: name });
        }
        if checkout {
            vcs.checkout(&name)?;
        }

        let binding = RemoteBinding::open(remote, vcs.root(), config)?;
        Ok(TrackingBranch {
            vcs,
            binding,
            branch: name,
            stage: None,
        })
    }

    /// Open the tracking branch that is currently checked out
    pub fn current(vcs: &'a dyn VersionControl, config: &GitpubConfig) -> Result<Self> {
        let current = vcs.current_branch()?;
        let (remote, branch) = vcs::parse_tracking_branch(&current)
            .ok_or_else(|| Error::NotOnTrackingBranch {
                current: current.clone(),
            })?;
        Self::open(vcs, config, remote, branch, false)
    }

    /// Create the tracking branch for a new remote at the current commit,
    /// check it out, and commit an empty document map on it.
    ///
    /// An existing tracking branch is opened and checked out instead.
    pub fn create(
        vcs: &'a dyn VersionControl,
        config: &GitpubConfig,
        remote: &str,
        branch: &str,
        spec: RemoteSpec,
    ) -> Result<Self> {
        let name = vcs::tracking_branch_name(remote, branch);
        if vcs.branch_exists(&name)? {
            tracing::info!("Tracking branch {} already exists", name);
            return Self::open(vcs, config, remote, branch, true);
        }

        let binding = RemoteBinding::create(remote, vcs.root(), config, spec)?;
        vcs.create_branch(&name)?;
        vcs.checkout(&name)?;

        let files = binding.save(false)?;
        add_files(vcs, &files)?;
        vcs.commit(&format!("initialize gitpub remote {}", remote))?;
        tracing::info!("Initialized remote {} on {}", remote, name);

        Ok(TrackingBranch {
            vcs,
            binding,
            branch: name,
            stage: None,
        })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn binding(&self) -> &RemoteBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut RemoteBinding {
        &mut self.binding
    }

    pub fn has_stage(&self) -> bool {
        self.stage.is_some()
    }

    /// The staging map, created from the committed map on first use
    pub fn stage(&mut self) -> &mut DocumentMap {
        self.stage.get_or_insert_with(|| self.binding.map().clone())
    }

    /// Stage a document for publishing. Attributes are merged into an
    /// existing record, so a re-added document keeps its remote identity.
    pub fn add(&mut self, path: &str, attrs: BTreeMap<String, String>) -> Result<()> {
        self.vcs.add(&[path])?;

        let stage = self.stage();
        let record = match stage.get(path) {
            Some(existing) => {
                let mut record = existing.clone();
                record.attrs.extend(attrs);
                record
            }
            None => DocRecord::with_attrs(attrs),
        };
        stage.set(path, record);
        tracing::debug!("Staged {}", path);
        Ok(())
    }

    /// Stage a document for removal from the remote
    pub fn rm(&mut self, path: &str) -> Result<()> {
        self.stage().remove(path)?;
        tracing::debug!("Staged removal of {}", path);
        Ok(())
    }

    /// Rename a document locally, keeping its remote identity
    pub fn mv(&mut self, old: &str, new: &str) -> Result<()> {
        self.stage().mv(old, new)?;
        self.vcs.mv(old, new)
    }

    /// Write the staged map to the working tree and stage it for the next
    /// version control commit
    pub fn save_stage(&mut self) -> Result<()> {
        let stage = self.stage.as_ref().ok_or(Error::NothingStaged)?;
        self.binding.set_map(stage.clone());
        let files = self.binding.save(false)?;
        add_files(self.vcs, &files)
    }

    /// Commit the document map on the tracking branch, folding in the stage
    /// when `from_stage` is set. Returns the new commit, or `None` when there
    /// was nothing to commit.
    pub fn commit(&mut self, message: &str, from_stage: bool) -> Result<Option<String>> {
        if from_stage && self.stage.is_none() {
            return Err(Error::NothingStaged);
        }

        let state = RepoState::capture(self.vcs)?;
        if let Err(e) = self.vcs.checkout(&self.branch) {
            return state.restore_after(self.vcs, Err(e));
        }
        self.commit_with_state(message, from_stage, false, state)
    }

    fn commit_with_state(
        &mut self,
        message: &str,
        from_stage: bool,
        last_push: bool,
        state: RepoState,
    ) -> Result<Option<String>> {
        let has_changes = match self.write_maps(from_stage, last_push) {
            Ok(has_changes) => has_changes,
            Err(e) => return state.restore_after(self.vcs, Err(e)),
        };

        let commit = if has_changes {
            // A failed commit leaves the tracking branch checked out so the
            // index can be inspected
            Some(self.vcs.commit(message).map_err(Error::commit_failed)?)
        } else {
            tracing::info!("No document map changes to commit on {}", self.branch);
            None
        };

        if from_stage {
            self.stage = None;
        }
        state.restore(self.vcs)?;
        Ok(commit)
    }

    /// Fold the stage if asked, write the map files and stage them.
    /// Returns whether the index now differs from HEAD.
    fn write_maps(&mut self, from_stage: bool, last_push: bool) -> Result<bool> {
        if from_stage {
            if let Some(stage) = &self.stage {
                self.binding.set_map(stage.clone());
            }
        }
        let files = self.binding.save(last_push)?;
        add_files(self.vcs, &files)?;
        self.vcs.has_staged_changes()
    }

    /// Merge `source` into the tracking branch (unless `update_only`), then
    /// refresh content hashes and commit the updated map
    pub fn merge(&mut self, source: &str, update_only: bool) -> Result<Option<String>> {
        let state = RepoState::capture(self.vcs)?;
        if let Err(e) = self.merge_into_stage(source, update_only) {
            return state.restore_after(self.vcs, Err(e));
        }
        let message = format!("updated {} docmap from {}", self.branch, source);
        self.commit_with_state(&message, true, false, state)
    }

    fn merge_into_stage(&mut self, source: &str, update_only: bool) -> Result<()> {
        self.vcs.checkout(&self.branch)?;
        if !update_only {
            self.vcs.merge(source)?;
        }
        let root = self.vcs.root().to_path_buf();
        let changed = self.stage().refresh_hashes(&root)?;
        tracing::info!("{} document(s) changed since the last commit", changed.len());
        Ok(())
    }

    /// Push the committed map to the remote and commit the result, including
    /// the last-push snapshot
    pub fn push(&mut self) -> Result<PushReport> {
        let state = RepoState::capture(self.vcs)?;
        let report = match self
            .vcs
            .checkout(&self.branch)
            .and_then(|()| self.binding.push(None))
        {
            Ok(report) => report,
            Err(e) => return state.restore_after(self.vcs, Err(e)),
        };
        self.commit_with_state("publish doc changes to remote", false, true, state)?;
        Ok(report)
    }

    /// Bring remote changes into the tracking branch: the full revision
    /// history when the adapter has one, otherwise the latest versions
    pub fn fetch(&mut self) -> Result<Option<String>> {
        let state = RepoState::capture(self.vcs)?;
        let message = match self
            .vcs
            .checkout(&self.branch)
            .and_then(|()| self.fetch_changes())
        {
            Ok(message) => message,
            Err(e) => return state.restore_after(self.vcs, Err(e)),
        };
        self.commit_with_state(message, false, true, state)
    }

    fn fetch_changes(&mut self) -> Result<&'static str> {
        if self.binding.adapter().supports_history() {
            let commits = self.binding.fetch_history(self.vcs)?;
            tracing::info!("Committed {} remote revision(s)", commits);
            Ok("updated doc mappings and revision history from fetch")
        } else {
            let changed = self.binding.fetch_latest()?;
            add_files(self.vcs, &changed)?;
            tracing::info!("Fetched {} changed document(s)", changed.len());
            Ok("fetch from remote")
        }
    }
}

fn add_files(vcs: &dyn VersionControl, files: &[String]) -> Result<()> {
    let paths: Vec<&str> = files.iter().map(String::as_str).collect();
    vcs.add(&paths)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::vcs::mock::MockVcs;

    const TRACKING: &str = "gpremotes/wiki/master";

    struct Fixture {
        repo: TempDir,
        wiki: TempDir,
        config: GitpubConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = TempDir::new().unwrap();
            fs::write(repo.path().join("notes.rst"), "Notes\n=====\n").unwrap();
            Fixture {
                repo,
                wiki: TempDir::new().unwrap(),
                config: GitpubConfig::default(),
            }
        }

        fn vcs(&self) -> MockVcs {
            MockVcs::new(self.repo.path(), "master")
        }

        fn spec(&self) -> RemoteSpec {
            let spec = format!("wiki:{}", self.wiki.path().display());
            RemoteSpec::parse(&spec, "alice").unwrap()
        }
    }

    #[test]
    fn test_create_initializes_branch() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;

        assert_eq!(tb.branch(), TRACKING);
        assert_eq!(vcs.current(), TRACKING);
        assert!(fx.repo.path().join(".gitpub/wiki.yaml").exists());
        assert_eq!(
            vcs.log(),
            vec![
                format!("branch {}", TRACKING),
                format!("checkout {}", TRACKING),
                "commit initialize gitpub remote wiki".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_open_missing_branch() {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        assert!(matches!(
            TrackingBranch::open(&vcs, &fx.config, "wiki", "master", true),
            Err(Error::NoSuchRemoteBranch { branch }) if branch == TRACKING
        ));
    }

    #[test]
    fn test_current_requires_tracking_branch() {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        assert!(matches!(
            TrackingBranch::current(&vcs, &fx.config),
            Err(Error::NotOnTrackingBranch { current }) if current == "master"
        ));
    }

    #[test]
    fn test_commit_restores_branch() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        vcs.checkout("master")?;

        tb.add("notes.rst", BTreeMap::new())?;
        assert!(tb.has_stage());
        let commit = tb.commit("add notes", true)?;

        assert!(commit.is_some());
        assert_eq!(vcs.current(), "master");
        assert!(!tb.has_stage());
        assert!(tb.binding().map().get("notes.rst").is_some());
        assert!(vcs.log().contains(&"commit add notes".to_string()));
        Ok(())
    }

    #[test]
    fn test_commit_without_stage() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        let calls = vcs.log().len();

        assert!(matches!(tb.commit("empty", true), Err(Error::NothingStaged)));
        assert_eq!(vcs.log().len(), calls);
        Ok(())
    }

    #[test]
    fn test_failed_commit_stays_on_tracking_branch() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        vcs.checkout("master")?;
        tb.add("notes.rst", BTreeMap::new())?;

        vcs.state.borrow_mut().fail_commit = true;
        assert!(matches!(
            tb.commit("add notes", true),
            Err(Error::CommitFailed(_))
        ));
        assert_eq!(vcs.current(), TRACKING);
        assert!(tb.has_stage());
        Ok(())
    }

    #[test]
    fn test_failed_merge_restores_branch() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        vcs.checkout("master")?;

        vcs.state.borrow_mut().fail_merge = true;
        assert!(matches!(
            tb.merge("master", false),
            Err(Error::VersionControlCommandFailed { .. })
        ));
        assert_eq!(vcs.current(), "master");
        Ok(())
    }

    #[test]
    fn test_merge_update_only_refreshes_hashes() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        tb.add("notes.rst", BTreeMap::new())?;
        tb.commit("add notes", true)?;

        fs::write(fx.repo.path().join("notes.rst"), "Changed\n=======\n").unwrap();
        let commit = tb.merge("master", true)?;

        assert!(commit.is_some());
        assert!(!vcs.log().iter().any(|entry| entry.starts_with("merge")));
        assert_eq!(
            tb.binding().map().get("notes.rst").unwrap().content_hash,
            Some(crate::document::Document::text("Changed\n=======\n").content_hash())
        );
        Ok(())
    }

    #[test]
    fn test_mv_keeps_mapping() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        tb.add("notes.rst", BTreeMap::new())?;
        tb.commit("add notes", true)?;

        tb.mv("notes.rst", "journal.rst")?;
        assert!(fx.repo.path().join("journal.rst").exists());
        assert!(tb.stage().get("journal.rst").is_some());
        assert!(tb.stage().get("notes.rst").is_none());
        assert!(matches!(
            tb.mv("missing.rst", "other.rst"),
            Err(Error::DocumentNotMapped(_))
        ));
        Ok(())
    }

    #[test]
    fn test_add_keeps_remote_identity() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        tb.add("notes.rst", BTreeMap::new())?;
        tb.commit("add notes", true)?;
        tb.push()?;

        let mut attrs = BTreeMap::new();
        attrs.insert("page".to_string(), "Journal".to_string());
        tb.add("notes.rst", attrs)?;
        let record = tb.stage().get("notes.rst").unwrap().clone();
        assert!(record.remote_id.is_some());
        assert_eq!(record.attrs.get("page").map(String::as_str), Some("Journal"));
        Ok(())
    }

    #[test]
    fn test_push_publishes_and_snapshots() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        tb.add("notes.rst", BTreeMap::new())?;
        tb.commit("add notes", true)?;
        vcs.checkout("master")?;

        let report = tb.push()?;
        assert_eq!(report.published, vec!["notes.rst".to_string()]);
        assert_eq!(vcs.current(), "master");
        assert!(fx.repo.path().join(".gitpub/wiki.lastpush.yaml").exists());
        assert!(fx.wiki.path().join("pages/Notes/current").exists());
        let commits = vcs.state.borrow().commits;

        let report = tb.push()?;
        assert_eq!(report, PushReport::default());
        assert_eq!(vcs.state.borrow().commits, commits);
        Ok(())
    }

    #[test]
    fn test_fetch_imports_remote_history() -> Result<()> {
        let fx = Fixture::new();
        let vcs = fx.vcs();
        let mut tb = TrackingBranch::create(&vcs, &fx.config, "wiki", "master", fx.spec())?;
        vcs.checkout("master")?;

        let page = fx.wiki.path().join("pages/FrontPage");
        fs::create_dir_all(page.join("revisions")).unwrap();
        fs::write(page.join("revisions/00000001"), "Welcome").unwrap();
        fs::write(page.join("current"), "00000001\n").unwrap();

        let commit = tb.fetch()?;
        assert!(commit.is_some());
        assert_eq!(vcs.current(), "master");
        assert_eq!(
            fs::read_to_string(fx.repo.path().join("wiki-import/FrontPage.rst")).unwrap(),
            "Welcome"
        );
        let record = tb.binding().map().get("wiki-import/FrontPage.rst").unwrap();
        assert_eq!(record.revision_commits.len(), 1);

        assert!(tb.fetch()?.is_none());
        Ok(())
    }
}
