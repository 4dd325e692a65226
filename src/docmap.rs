//! The persisted path <-> remote id document map.

mod diff;
mod record;
mod remote_id;

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub use diff::MapDiff;
pub use record::{DocRecord, RemoteAttrs};
pub use remote_id::RemoteId;

use crate::{
    adapter::RemoteSpec,
    document::Document,
    error::{Error, Result},
};

/// Bidirectional index of the documents bound to one remote.
///
/// Records are owned by the path index; the remote id index maps each
/// published document's remote id back to its path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMap {
    by_path: BTreeMap<String, DocRecord>,
    by_remote_id: BTreeMap<RemoteId, String>,
}

/// On-disk form of a document map. Only the path index is stored; the
/// remote id index is rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MapFile {
    adapter_type: String,
    #[serde(default)]
    adapter_args: BTreeMap<String, String>,
    #[serde(default)]
    documents: BTreeMap<String, DocRecord>,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&DocRecord> {
        self.by_path.get(path)
    }

    /// Like [`get`](Self::get), but an unmapped path is an error
    pub fn require(&self, path: &str) -> Result<&DocRecord> {
        self.get(path)
            .ok_or_else(|| Error::DocumentNotMapped(path.to_string()))
    }

    pub fn get_by_remote_id(&self, remote_id: &RemoteId) -> Option<&DocRecord> {
        self.by_remote_id
            .get(remote_id)
            .and_then(|path| self.by_path.get(path))
    }

    /// Insert or replace the record for `path`.
    ///
    /// Any remote id previously indexed for this path is dropped first; the
    /// record's own remote id, if any, is indexed.
    pub fn set(&mut self, path: impl Into<String>, mut record: DocRecord) {
        let path = path.into();
        self.drop_remote_entry(&path);
        record.path = path.clone();

        if let Some(remote_id) = &record.remote_id {
            if let Some(previous) = self.by_remote_id.insert(remote_id.clone(), path.clone()) {
                if previous != path {
                    tracing::warn!(
                        "Remote id {} moved from {} to {}",
                        remote_id,
                        previous,
                        path
                    );
                    if let Some(stale) = self.by_path.get_mut(&previous) {
                        stale.remote_id = None;
                    }
                }
            }
        }

        self.by_path.insert(path, record);
    }

    /// Remove the record for `path` together with its remote id entry
    pub fn remove(&mut self, path: &str) -> Result<DocRecord> {
        self.drop_remote_entry(path);
        self.by_path
            .remove(path)
            .ok_or_else(|| Error::DocumentNotMapped(path.to_string()))
    }

    /// Remove the record published under `remote_id`, if there is one
    pub fn remove_by_remote_id(&mut self, remote_id: &RemoteId) -> Option<DocRecord> {
        let path = self.by_remote_id.remove(remote_id)?;
        self.by_path.remove(&path)
    }

    /// Re-key a record from `old` to `new`, keeping its remote identity
    pub fn mv(&mut self, old: &str, new: &str) -> Result<()> {
        let record = self.remove(old)?;
        self.set(new, record);
        Ok(())
    }

    /// Remember the local commit that recorded `revision` of the document at `path`
    pub fn record_revision(&mut self, path: &str, revision: &str, commit: &str) -> Result<()> {
        let record = self
            .by_path
            .get_mut(path)
            .ok_or_else(|| Error::DocumentNotMapped(path.to_string()))?;
        record
            .revision_commits
            .insert(revision.to_string(), commit.to_string());
        Ok(())
    }

    fn drop_remote_entry(&mut self, path: &str) {
        let remote_id = self
            .by_path
            .get(path)
            .and_then(|record| record.remote_id.clone());
        if let Some(remote_id) = remote_id {
            if self.by_remote_id.get(&remote_id).map(String::as_str) == Some(path) {
                self.by_remote_id.remove(&remote_id);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocRecord)> {
        self.by_path.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn remote_ids(&self) -> impl Iterator<Item = &RemoteId> {
        self.by_remote_id.keys()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Compare this map (the newer one) against `old`
    pub fn diff(&self, old: &DocumentMap) -> MapDiff {
        MapDiff::between(self, old)
    }

    /// Recompute content hashes from the files under `root`.
    ///
    /// Picks up changes that entered the working tree without going through
    /// the map, e.g. a merge. Returns the paths whose hash changed.
    pub fn refresh_hashes(&mut self, root: &Path) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for (path, record) in self.by_path.iter_mut() {
            let doc = match Document::load(root, path) {
                Ok(doc) => doc,
                Err(Error::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    tracing::warn!("Mapped document {} is missing, skipping", path);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let content_hash = doc.content_hash();
            if record.content_hash.as_deref() != Some(content_hash.as_str()) {
                tracing::debug!("Content of {} changed", path);
                record.content_hash = Some(content_hash);
                changed.push(path.clone());
            }
        }
        Ok(changed)
    }

    /// Load a map file, returning the map and the remote spec it was saved with
    pub fn load(path: &Path) -> Result<(Self, RemoteSpec)> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file: MapFile = serde_yaml::from_str(&content)?;

        let mut map = DocumentMap::new();
        for (doc_path, record) in file.documents {
            map.set(doc_path, record);
        }
        tracing::debug!("Loaded {} document(s) from {:?}", map.len(), path);

        Ok((map, RemoteSpec::new(file.adapter_type, file.adapter_args)))
    }

    /// Load a map file, or an empty map if the file does not exist
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(DocumentMap::new());
        }
        Ok(Self::load(path)?.0)
    }

    /// Atomically write this map to `path` (temp file + rename)
    pub fn save(&self, path: &Path, spec: &RemoteSpec) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let file = MapFile {
            adapter_type: spec.adapter_type.clone(),
            adapter_args: spec.args.clone(),
            documents: self.by_path.clone(),
        };
        let yaml = serde_yaml::to_string(&file)?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        temp.write_all(yaml.as_bytes())
            .map_err(|e| Error::io(temp.path(), e))?;
        temp.persist(path).map_err(|e| Error::io(path, e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn published(id: &str, hash: &str) -> DocRecord {
        DocRecord {
            remote_id: Some(RemoteId::Post(id.to_string())),
            content_hash: Some(hash.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut map = DocumentMap::new();
        let attrs = published("1", "h1");
        map.set("notes.rst", attrs.clone());

        let record = map.get("notes.rst").unwrap();
        assert_eq!(record.path, "notes.rst");
        assert_eq!(record.remote_id, attrs.remote_id);
        assert_eq!(record.content_hash, attrs.content_hash);
        assert_eq!(
            map.get_by_remote_id(&RemoteId::Post("1".to_string()))
                .unwrap()
                .path,
            "notes.rst"
        );
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut once = DocumentMap::new();
        once.set("a.rst", published("1", "h1"));

        let mut twice = DocumentMap::new();
        twice.set("a.rst", published("1", "h1"));
        twice.set("a.rst", published("1", "h1"));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_replaces_stale_remote_id() {
        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        map.set("a.rst", published("2", "h1"));

        assert!(map.get_by_remote_id(&RemoteId::Post("1".to_string())).is_none());
        assert_eq!(map.remote_ids().count(), 1);
    }

    #[test]
    fn test_unpublished_record_is_path_only() {
        let mut map = DocumentMap::new();
        map.set("draft.rst", DocRecord::default());
        assert!(map.get("draft.rst").is_some());
        assert_eq!(map.remote_ids().count(), 0);
    }

    #[test]
    fn test_remove_clears_both_indices() {
        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        map.remove("a.rst").unwrap();

        assert!(map.get("a.rst").is_none());
        assert!(map
            .remove_by_remote_id(&RemoteId::Post("1".to_string()))
            .is_none());
        assert!(matches!(
            map.remove("a.rst"),
            Err(Error::DocumentNotMapped(_))
        ));
    }

    #[test]
    fn test_remove_by_remote_id() {
        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        map.set("b.rst", published("2", "h2"));

        let removed = map
            .remove_by_remote_id(&RemoteId::Post("1".to_string()))
            .unwrap();
        assert_eq!(removed.path, "a.rst");
        assert!(map.get("a.rst").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_mv_keeps_remote_identity() {
        let mut map = DocumentMap::new();
        map.set("old.rst", published("1", "h1"));
        map.mv("old.rst", "new.rst").unwrap();

        assert!(map.get("old.rst").is_none());
        let record = map.get_by_remote_id(&RemoteId::Post("1".to_string())).unwrap();
        assert_eq!(record.path, "new.rst");
    }

    #[test]
    fn test_record_revision() {
        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        map.record_revision("a.rst", "00000002", "abc123").unwrap();

        let record = map.get("a.rst").unwrap();
        assert_eq!(
            record.revision_commits.get("00000002").map(String::as_str),
            Some("abc123")
        );
        assert!(matches!(
            map.record_revision("b.rst", "1", "x"),
            Err(Error::DocumentNotMapped(_))
        ));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        let mut copy = map.clone();
        copy.remove("a.rst").unwrap();
        assert!(map.get("a.rst").is_some());
    }

    #[test]
    fn test_refresh_hashes() -> Result<()> {
        let temp = TempDir::new().unwrap();
        Document::text("first").write(temp.path(), "a.rst")?;

        let mut map = DocumentMap::new();
        map.set("a.rst", DocRecord::default());
        map.set("gone.rst", DocRecord::default());
        assert_eq!(map.refresh_hashes(temp.path())?, vec!["a.rst".to_string()]);
        assert!(map.refresh_hashes(temp.path())?.is_empty());

        Document::text("second").write(temp.path(), "a.rst")?;
        assert_eq!(map.refresh_hashes(temp.path())?, vec!["a.rst".to_string()]);
        assert_eq!(
            map.get("a.rst").unwrap().content_hash,
            Some(Document::text("second").content_hash())
        );
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".gitpub/blog.yaml");
        let spec = RemoteSpec::parse("wiki:/srv/wiki:theme=dark", "alice")?;

        let mut map = DocumentMap::new();
        map.set("a.rst", published("1", "h1"));
        let mut draft = DocRecord::default();
        draft.attrs.insert("pubtype".to_string(), "page".to_string());
        map.set("b.rst", draft);
        map.save(&path, &spec)?;

        let (loaded, loaded_spec) = DocumentMap::load(&path)?;
        assert_eq!(loaded, map);
        assert_eq!(loaded_spec, spec);
        assert_eq!(
            loaded
                .get_by_remote_id(&RemoteId::Post("1".to_string()))
                .unwrap()
                .path,
            "a.rst"
        );
        Ok(())
    }

    #[test]
    fn test_load_or_empty_missing_file() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let map = DocumentMap::load_or_empty(&temp.path().join("none.yaml"))?;
        assert!(map.is_empty());
        Ok(())
    }
}
