//! A remote bound to its document map: push, fetch and status.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{
    adapter::{Adapter, LinkResolver, RemoteSpec},
    config::GitpubConfig,
    docmap::{DocRecord, DocumentMap, RemoteId},
    document::Document,
    error::{Error, Result},
    vcs::VersionControl,
};

/// Outcome of a push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub published: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<RemoteId>,
    /// Documents whose references were still unresolved when resolution stopped
    pub unresolved: Vec<String>,
    /// (path or remote id, error) for each document the adapter rejected
    pub failed: Vec<(String, String)>,
    pub resolution_rounds: usize,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.failed.is_empty()
    }
}

/// Pending local changes and remote drift for one remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub remote: String,
    pub adapter: String,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    /// Published documents the remote no longer lists
    pub missing_on_remote: Vec<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && self.missing_on_remote.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncMode {
    Publish,
    Update,
}

/// A named remote: its adapter, its document map, and where both live
pub struct RemoteBinding {
    name: String,
    root: PathBuf,
    map_dir: String,
    import_dir: String,
    spec: RemoteSpec,
    map: DocumentMap,
    adapter: Adapter,
}

impl RemoteBinding {
    /// Bind `adapter` to an empty document map
    pub fn new(
        name: &str,
        root: &Path,
        config: &GitpubConfig,
        spec: RemoteSpec,
        adapter: Adapter,
    ) -> Self {
        RemoteBinding {
            name: name.to_string(),
            root: root.to_path_buf(),
            map_dir: config.map_dir.clone(),
            import_dir: config.import_dir_for(name),
            spec,
            map: DocumentMap::new(),
            adapter,
        }
    }

    /// Connect the adapter named by `spec` for a new remote
    pub fn create(name: &str, root: &Path, config: &GitpubConfig, spec: RemoteSpec) -> Result<Self> {
        let adapter = Adapter::connect(&spec)?;
        Ok(Self::new(name, root, config, spec, adapter))
    }

    /// Load the remote's map file from the working tree and connect its adapter
    pub fn open(name: &str, root: &Path, config: &GitpubConfig) -> Result<Self> {
        let path = root.join(map_file_name(&config.map_dir, name, false));
        if !path.exists() {
            return Err(Error::RemoteNotInitialized(name.to_string()));
        }
        let (map, spec) = DocumentMap::load(&path)?;
        let adapter = Adapter::connect(&spec)?;

        let mut binding = Self::new(name, root, config, spec, adapter);
        binding.map = map;
        tracing::debug!(
            "Opened remote {} ({} adapter, {} document(s))",
            name,
            binding.adapter.kind(),
            binding.map.len()
        );
        Ok(binding)
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn map(&self) -> &DocumentMap {
        &self.map
    }

    /// Replace the live map, e.g. with a committed stage
    pub fn set_map(&mut self, map: DocumentMap) {
        self.map = map;
    }

    /// Repository-relative path of the map file, or of the last-push snapshot
    pub fn map_file(&self, last_push: bool) -> String {
        map_file_name(&self.map_dir, &self.name, last_push)
    }

    /// The map as of the last push; empty if never pushed
    pub fn last_push(&self) -> Result<DocumentMap> {
        DocumentMap::load_or_empty(&self.root.join(self.map_file(true)))
    }

    /// Write the live map, and the last-push snapshot when `last_push` is
    /// set. Returns the files written, relative to the repository root.
    pub fn save(&self, last_push: bool) -> Result<Vec<String>> {
        let mut written = vec![self.map_file(false)];
        if last_push {
            written.push(self.map_file(true));
        }
        for file in &written {
            self.map.save(&self.root.join(file), &self.spec)?;
        }
        Ok(written)
    }

    /// Send local changes to the remote.
    ///
    /// Without a target, the live map is compared with the last-push snapshot.
    /// With one, the target replaces the live map and is compared with it.
    /// The caller persists the resulting map as both live map and snapshot.
    pub fn push(&mut self, target: Option<&DocumentMap>) -> Result<PushReport> {
        let diff = match target {
            Some(target) => {
                let previous = std::mem::replace(&mut self.map, target.clone());
                self.map.diff(&previous)
            }
            None => self.map.diff(&self.last_push()?),
        };

        let mut report = PushReport::default();
        if diff.is_empty() {
            tracing::info!("Remote {} is up to date", self.name);
            return Ok(report);
        }
        tracing::info!("Pushing {} change(s) to {}", diff.len(), self.name);

        let pb = progress_bar(diff.len(), "Publishing documents");
        let mut unresolved = BTreeSet::new();

        // A renamed document shows up as added but keeps its remote id
        for path in diff.added.iter().chain(&diff.changed) {
            let mode = match self.map.get(path).and_then(|r| r.remote_id.as_ref()) {
                Some(_) => SyncMode::Update,
                None => SyncMode::Publish,
            };
            match self.sync_one(path, mode) {
                Ok(resolved) => {
                    match mode {
                        SyncMode::Publish => report.published.push(path.clone()),
                        SyncMode::Update => report.updated.push(path.clone()),
                    }
                    if !resolved {
                        unresolved.insert(path.clone());
                    }
                }
                Err(e) => {
                    self.mark_unsynced(path);
                    record_failure(&mut report, path, e);
                }
            }
            if let Some(ref bar) = pb {
                bar.inc(1);
            }
        }

        for remote_id in &diff.removed {
            match self.adapter.delete(remote_id) {
                Ok(()) => {
                    self.map.remove_by_remote_id(remote_id);
                    report.deleted.push(remote_id.clone());
                }
                Err(e) => record_failure(&mut report, &remote_id.to_string(), e),
            }
            if let Some(ref bar) = pb {
                bar.inc(1);
            }
        }

        if let Some(ref bar) = pb {
            bar.finish_with_message("Publishing complete");
        }

        self.resolve_references(unresolved, &mut report);
        Ok(report)
    }

    /// Re-send documents with unresolved references until a round fails to
    /// shrink the unresolved set
    fn resolve_references(&mut self, mut unresolved: BTreeSet<String>, report: &mut PushReport) {
        while !unresolved.is_empty() {
            report.resolution_rounds += 1;
            tracing::debug!(
                "Resolution round {}: {} document(s) with unresolved references",
                report.resolution_rounds,
                unresolved.len()
            );

            let mut next = BTreeSet::new();
            for path in &unresolved {
                match self.sync_one(path, SyncMode::Update) {
                    Ok(true) => {}
                    Ok(false) => {
                        next.insert(path.clone());
                    }
                    Err(e) => {
                        self.mark_unsynced(path);
                        record_failure(report, path, e);
                    }
                }
            }

            let stalled = next.len() >= unresolved.len();
            unresolved = next;
            if stalled {
                break;
            }
        }

        if !unresolved.is_empty() {
            let paths: Vec<String> = unresolved.into_iter().collect();
            tracing::warn!(
                "{}",
                Error::UnresolvedReference {
                    paths: paths.clone()
                }
            );
            report.unresolved = paths;
        }
    }

    /// Forget the content hash of a document the remote rejected, so the
    /// snapshot taken after this push still differs and the next push retries
    fn mark_unsynced(&mut self, path: &str) {
        if let Some(record) = self.map.get(path) {
            let mut record = record.clone();
            record.content_hash = None;
            self.map.set(path, record);
        }
    }

    /// Publish or update one mapped document, folding the remote's answer
    /// into its record. Returns whether all its references resolved.
    fn sync_one(&mut self, path: &str, mode: SyncMode) -> Result<bool> {
        let doc = Document::load(&self.root, path)?;
        let mut record = self.map.require(path)?.clone();

        let mut links = LinkResolver::new(&self.map, path);
        let attrs = match (mode, record.remote_id.clone()) {
            (SyncMode::Update, Some(remote_id)) => {
                self.adapter.update(&remote_id, &doc, &record, &mut links)?
            }
            _ => Some(self.adapter.publish(&doc, &record, &mut links)?),
        };
        let resolved = links.is_resolved();
        if !resolved {
            tracing::debug!(
                "{} has unresolved references: {:?}",
                path,
                links.unresolved()
            );
        }

        if let Some(attrs) = attrs {
            record.merge(attrs);
        }
        record.content_hash = Some(doc.content_hash());
        self.map.set(path, record);
        Ok(resolved)
    }

    /// Import the current version of every listed remote document that
    /// differs from the local copy. Returns the local paths written.
    pub fn fetch_latest(&mut self) -> Result<Vec<String>> {
        self.adapter.require_fetch()?;
        let listing = self.adapter.list()?;
        tracing::info!("Remote {} lists {} document(s)", self.name, listing.len());

        let import_dir = self.import_dir.clone();
        let mut changed = Vec::new();
        for remote_id in listing.keys() {
            match self.import_doc(remote_id, &import_dir, None) {
                Ok(Some(path)) => changed.push(path),
                Ok(None) => {}
                Err(e @ Error::AdapterCallFailed { .. }) => {
                    tracing::warn!("Skipping {}: {}", remote_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(changed)
    }

    /// Fetch one remote document into the working tree.
    ///
    /// A mapped document is written to its mapped path; an unknown one to
    /// `import_dir`. Returns `None` when the local copy is already current.
    pub fn import_doc(
        &mut self,
        remote_id: &RemoteId,
        import_dir: &str,
        revision: Option<&str>,
    ) -> Result<Option<String>> {
        let (doc, attrs) = self.adapter.fetch_one(remote_id, revision)?;

        let (path, mut record) = match self.map.get_by_remote_id(remote_id) {
            Some(record) => (record.path.clone(), record.clone()),
            None => (
                format!("{}/{}", import_dir, default_file_name(remote_id)),
                DocRecord::default(),
            ),
        };

        let content_hash = doc.content_hash();
        if let Some(recorded) = &record.content_hash {
            let same_source = attrs.content_hash.as_ref() == Some(recorded);
            if same_source || &content_hash == recorded {
                tracing::debug!("{} is unchanged", path);
                return Ok(None);
            }
        }

        doc.write(&self.root, &path)?;
        tracing::info!("Imported {} into {}", remote_id, path);

        record.merge(attrs);
        record.content_hash = Some(content_hash);
        self.map.set(path.as_str(), record);
        Ok(Some(path))
    }

    /// Replay the remote's revision history as local commits, oldest first,
    /// one commit per (document, revision). Returns the number of commits.
    pub fn fetch_history(&mut self, vcs: &dyn VersionControl) -> Result<usize> {
        self.adapter.require_history()?;
        let listing = self.adapter.list()?;

        let mut timeline = Vec::new();
        for remote_id in listing.keys() {
            match self.adapter.fetch_history(remote_id) {
                Ok(history) => {
                    for (revision, info) in history {
                        timeline.push((info.timestamp, remote_id.clone(), revision));
                    }
                }
                Err(e @ Error::AdapterCallFailed { .. }) => {
                    tracing::warn!("Skipping history of {}: {}", remote_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        timeline.sort();
        tracing::info!("Replaying {} remote revision(s)", timeline.len());

        let pb = progress_bar(timeline.len(), "Replaying revisions");
        let mut commits = 0;
        let replayed = self.replay(vcs, timeline, pb.as_ref(), &mut commits);

        if let Err(e) = replayed {
            if commits > 0 {
                // Revision commits already on the branch must stay known to
                // the map, or the next fetch replays them again
                if let Err(save_err) = self.record_progress(vcs) {
                    tracing::warn!("Failed to record fetched revisions: {}", save_err);
                }
            }
            return Err(e);
        }

        if let Some(ref bar) = pb {
            bar.finish_with_message("Replay complete");
        }
        Ok(commits)
    }

    fn replay(
        &mut self,
        vcs: &dyn VersionControl,
        timeline: Vec<(DateTime<Utc>, RemoteId, String)>,
        pb: Option<&ProgressBar>,
        commits: &mut usize,
    ) -> Result<()> {
        let import_dir = self.import_dir.clone();

        for (timestamp, remote_id, revision) in timeline {
            if let Some(bar) = pb {
                bar.inc(1);
            }
            let known = self
                .map
                .get_by_remote_id(&remote_id)
                .is_some_and(|record| record.revision_commits.contains_key(&revision));
            if known {
                continue;
            }

            let before = self.map.get_by_remote_id(&remote_id).cloned();
            let path = match self.import_doc(&remote_id, &import_dir, Some(&revision)) {
                Ok(Some(path)) => path,
                Ok(None) => continue,
                Err(e @ Error::AdapterCallFailed { .. }) => {
                    tracing::warn!("Skipping revision {} of {}: {}", revision, remote_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let message = format!(
                "{} revision {} on {}",
                timestamp.format("%a %b %e %H:%M:%S %Y"),
                revision,
                remote_id
            );
            let commit = match vcs
                .add(&[path.as_str()])
                .and_then(|()| vcs.commit(&message).map_err(Error::commit_failed))
            {
                Ok(commit) => commit,
                Err(e) => {
                    // The record must not claim an import that was never committed
                    match before {
                        Some(record) => self.map.set(record.path.clone(), record),
                        None => {
                            self.map.remove_by_remote_id(&remote_id);
                        }
                    }
                    return Err(e);
                }
            };
            self.map.record_revision(&path, &revision, &commit)?;
            *commits += 1;
        }
        Ok(())
    }

    /// Commit the live map alone after an interrupted replay
    fn record_progress(&self, vcs: &dyn VersionControl) -> Result<()> {
        let written = self.save(false)?;
        let paths: Vec<&str> = written.iter().map(String::as_str).collect();
        vcs.add(&paths)?;
        vcs.commit("Record fetched revisions")?;
        Ok(())
    }

    /// Compare the live map with the last push, and with the remote listing
    pub fn status(&mut self) -> Result<StatusReport> {
        let diff = self.map.diff(&self.last_push()?);
        let listing = self.adapter.list()?;

        let missing_on_remote = self
            .map
            .iter()
            .filter(|(_, record)| !record.unlisted)
            .filter_map(|(path, record)| {
                let remote_id = record.remote_id.as_ref()?;
                (!listing.contains_key(remote_id)).then(|| path.to_string())
            })
            .collect();

        Ok(StatusReport {
            remote: self.name.clone(),
            adapter: self.adapter.kind().to_string(),
            added: diff.added,
            changed: diff.changed,
            removed: diff.removed.iter().map(RemoteId::to_string).collect(),
            missing_on_remote,
        })
    }
}

fn map_file_name(map_dir: &str, remote: &str, last_push: bool) -> String {
    let suffix = if last_push { ".lastpush" } else { "" };
    format!("{}/{}{}.yaml", map_dir.trim_end_matches('/'), remote, suffix)
}

fn record_failure(report: &mut PushReport, target: &str, error: Error) {
    tracing::warn!("Failed to sync {}: {}", target, error);
    report.failed.push((target.to_string(), error.to_string()));
}

/// Local file name for a document first seen on the remote
fn default_file_name(remote_id: &RemoteId) -> String {
    match remote_id {
        RemoteId::File(name) => name.clone(),
        RemoteId::Page(id) | RemoteId::Post(id) => format!("{}.rst", id),
    }
}

fn progress_bar(len: usize, message: &'static str) -> Option<ProgressBar> {
    if len <= 10 {
        return None;
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.set_message(message);
    Some(bar)
}
