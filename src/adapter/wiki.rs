//! Wiki export directory adapter.
//!
//! Publishes to a MoinMoin-style page store on the local filesystem:
//!
//! ```text
//! <dir>/pages/<Page>/current              current revision id
//! <dir>/pages/<Page>/revisions/00000001   page text, one file per revision
//! <dir>/pages/<Page>/meta.yaml            title and source hash per revision
//! <dir>/attachments/<name>                binary documents
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    rewrite_doc_refs, FetchRemote, HistoryRemote, LinkResolver, Listing, RemoteAdapter,
    RemoteSpec, Revision,
};
use crate::{
    config,
    docmap::{DocRecord, RemoteAttrs, RemoteId},
    document::{self, Body, Document},
    error::{Error, Result},
};

const PAGES_DIR: &str = "pages";
const ATTACHMENTS_DIR: &str = "attachments";
const REVISIONS_DIR: &str = "revisions";
const CURRENT_FILE: &str = "current";
const META_FILE: &str = "meta.yaml";

/// Page metadata kept next to the revisions
#[derive(Debug, Serialize, Deserialize)]
struct PageMeta {
    title: String,
    revision: String,
    /// Local path the page is published from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    /// Hash of the local source each pushed revision was rendered from.
    /// Revisions edited on the wiki itself have no entry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    source_hashes: BTreeMap<String, String>,
}

pub struct WikiExport {
    root: PathBuf,
}

impl WikiExport {
    pub const KIND: &'static str = "wiki";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        WikiExport { root: root.into() }
    }

    /// Build from a remote spec; the export directory is the `dir` argument,
    /// falling back to its host
    pub fn from_spec(spec: &RemoteSpec) -> Result<Self> {
        let dir = spec
            .arg("dir")
            .or_else(|| spec.arg("host"))
            .ok_or_else(|| Error::InvalidRemoteSpec {
                spec: spec.adapter_type.clone(),
                reason: "wiki remotes need a directory".to_string(),
            })?;
        Ok(WikiExport::new(config::expand_tilde(Path::new(dir))))
    }

    fn page_dir(&self, page: &str) -> PathBuf {
        self.root.join(PAGES_DIR).join(page)
    }

    fn revision_path(&self, page: &str, revision: &str) -> PathBuf {
        self.page_dir(page).join(REVISIONS_DIR).join(revision)
    }

    fn attachment_path(&self, name: &str) -> PathBuf {
        self.root.join(ATTACHMENTS_DIR).join(name)
    }

    fn current_revision(&self, page: &str) -> Result<Option<String>> {
        let path = self.page_dir(page).join(CURRENT_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn read_meta(&self, page: &str) -> Result<Option<PageMeta>> {
        let path = self.page_dir(page).join(META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Some(serde_yaml::from_str(&content)?))
    }

    fn write_meta(&self, page: &str, meta: &PageMeta) -> Result<()> {
        let path = self.page_dir(page).join(META_FILE);
        fs::write(&path, serde_yaml::to_string(meta)?).map_err(|e| Error::io(path, e))
    }

    /// Append a revision holding `text` and make it current
    fn write_revision(&self, page: &str, text: &str) -> Result<String> {
        let next = match self.current_revision(page)? {
            Some(current) => {
                let current: u32 = current.parse().map_err(|_| {
                    Error::adapter_call(
                        &RemoteId::Page(page.to_string()),
                        format!("unreadable current revision {:?}", current),
                    )
                })?;
                current + 1
            }
            None => 1,
        };
        let revision = format!("{:08}", next);

        let path = self.revision_path(page, &revision);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;

        let current = self.page_dir(page).join(CURRENT_FILE);
        fs::write(&current, format!("{}\n", revision)).map_err(|e| Error::io(current, e))?;

        tracing::debug!("Wrote revision {} of wiki page {}", revision, page);
        Ok(revision)
    }

    /// Fail if `page` is already published from a different local document
    fn check_page_owner(&self, page: &str, source: &str) -> Result<()> {
        let owner = self.read_meta(page)?.and_then(|meta| meta.source);
        match owner {
            Some(owner) if owner != source => Err(Error::adapter_call(
                &RemoteId::Page(page.to_string()),
                format!("page is already published from {}", owner),
            )),
            _ => Ok(()),
        }
    }

    fn store_page(&self, page: &str, doc: &Document, source: &str, rendered: &str) -> Result<()> {
        let unchanged = match self.current_revision(page)? {
            Some(current) => fs::read_to_string(self.revision_path(page, &current))
                .map(|text| text == rendered)
                .unwrap_or(false),
            None => false,
        };

        let revision = if unchanged {
            tracing::debug!("Wiki page {} is unchanged, keeping current revision", page);
            self.current_revision(page)?.unwrap_or_default()
        } else {
            self.write_revision(page, rendered)?
        };

        let mut source_hashes = self
            .read_meta(page)?
            .map(|meta| meta.source_hashes)
            .unwrap_or_default();
        source_hashes.insert(revision.clone(), doc.content_hash());

        self.write_meta(
            page,
            &PageMeta {
                title: doc.title.clone(),
                revision,
                source: Some(source.to_string()),
                source_hashes,
            },
        )
    }

    fn store_attachment(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.attachment_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, data).map_err(|e| Error::io(path, e))
    }
}

/// Wiki page name for a local document: the `page` attribute if given,
/// otherwise the file stem in CamelCase
fn page_name(record: &DocRecord) -> String {
    if let Some(page) = record.attrs.get("page") {
        return page.clone();
    }
    let stem = Path::new(&record.path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() {
        "Untitled".to_string()
    } else {
        name
    }
}

fn attachment_name(record: &DocRecord) -> &str {
    record.path.rsplit('/').next().unwrap_or(&record.path)
}

fn attachment_path_attr(name: &str) -> String {
    format!("attachment:{}", name)
}

/// Render reST text for the wiki, turning `:doc:` references into wiki links.
/// References that do not resolve yet degrade to their label.
fn render(text: &str, links: &mut LinkResolver<'_>) -> String {
    rewrite_doc_refs(text, links, |doc_ref, remote_path| match remote_path {
        Some(remote_path) => format!("[[{}|{}]]", remote_path, doc_ref.label),
        None => doc_ref.label.to_string(),
    })
}

/// Turn wiki links back into reST hyperlinks
fn parse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        out.push_str(&rest[..start]);
        let inner = &after[..end];
        match inner.split_once('|') {
            Some((target, label)) => out.push_str(&format!("`{} <{}>`_", label, target)),
            None => out.push_str(&format!("`<{}>`_", inner)),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| Error::io(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

impl RemoteAdapter for WikiExport {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn publish(
        &mut self,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<RemoteAttrs> {
        match &doc.body {
            Body::Binary { data, .. } => {
                let name = attachment_name(record);
                self.store_attachment(name, data)?;
                tracing::info!("Uploaded attachment {}", name);
                let mut attrs = RemoteAttrs::published(RemoteId::File(name.to_string()))
                    .with_remote_path(attachment_path_attr(name));
                attrs.unlisted = Some(true);
                Ok(attrs)
            }
            Body::Text(text) => {
                let page = page_name(record);
                self.check_page_owner(&page, &record.path)?;
                let rendered = render(text, links);
                self.store_page(&page, doc, &record.path, &rendered)?;
                tracing::info!("Published wiki page {}", page);
                Ok(RemoteAttrs::published(RemoteId::Page(page.clone())).with_remote_path(page))
            }
        }
    }

    fn update(
        &mut self,
        remote_id: &RemoteId,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<Option<RemoteAttrs>> {
        match (remote_id, &doc.body) {
            (RemoteId::Page(page), Body::Text(text)) => {
                let rendered = render(text, links);
                self.store_page(page, doc, &record.path, &rendered)?;
                Ok(None)
            }
            (RemoteId::File(name), Body::Binary { data, .. }) => {
                self.store_attachment(name, data)?;
                Ok(None)
            }
            _ => Err(Error::adapter_call(
                remote_id,
                "document kind does not match the remote artifact",
            )),
        }
    }

    fn delete(&mut self, remote_id: &RemoteId) -> Result<()> {
        let path = match remote_id {
            RemoteId::Page(page) => self.page_dir(page),
            RemoteId::File(name) => self.attachment_path(name),
            RemoteId::Post(_) => return Err(Error::adapter_call(remote_id, "wikis have no posts")),
        };

        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => {
                tracing::info!("Deleted {}", remote_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn list(&mut self) -> Result<Listing> {
        let mut listing = Listing::new();
        let pages = self.root.join(PAGES_DIR);
        if !pages.exists() {
            return Ok(listing);
        }

        for entry in fs::read_dir(&pages).map_err(|e| Error::io(&pages, e))? {
            let entry = entry.map_err(|e| Error::io(&pages, e))?;
            let Some(page) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !entry.path().join(CURRENT_FILE).exists() {
                continue;
            }

            let mut attrs = BTreeMap::new();
            if let Some(meta) = self.read_meta(&page)? {
                attrs.insert("title".to_string(), meta.title);
            }
            listing.insert(RemoteId::Page(page), attrs);
        }
        Ok(listing)
    }
}

impl FetchRemote for WikiExport {
    fn fetch_one(
        &mut self,
        remote_id: &RemoteId,
        revision: Option<&str>,
    ) -> Result<(Document, RemoteAttrs)> {
        match remote_id {
            RemoteId::Page(page) => {
                let revision = match revision {
                    Some(revision) => revision.to_string(),
                    None => self
                        .current_revision(page)?
                        .ok_or_else(|| Error::adapter_call(remote_id, "no such page"))?,
                };
                let text = fs::read_to_string(self.revision_path(page, &revision))
                    .map_err(|e| Error::adapter_call(remote_id, e))?;

                let content_hash = self
                    .read_meta(page)?
                    .and_then(|mut meta| meta.source_hashes.remove(&revision));

                let attrs = RemoteAttrs {
                    content_hash,
                    ..RemoteAttrs::published(remote_id.clone()).with_remote_path(page.clone())
                };
                Ok((Document::text(parse(&text)), attrs))
            }
            RemoteId::File(name) => {
                let data = fs::read(self.attachment_path(name))
                    .map_err(|e| Error::adapter_call(remote_id, e))?;
                let content_type =
                    document::content_type_for(name).unwrap_or("application/octet-stream");
                let mut doc = Document::binary(data, content_type);
                doc.title = name.clone();

                let mut attrs = RemoteAttrs::published(remote_id.clone())
                    .with_remote_path(attachment_path_attr(name));
                attrs.unlisted = Some(true);
                Ok((doc, attrs))
            }
            RemoteId::Post(_) => Err(Error::adapter_call(remote_id, "wikis have no posts")),
        }
    }
}

impl HistoryRemote for WikiExport {
    fn fetch_history(&mut self, remote_id: &RemoteId) -> Result<BTreeMap<String, Revision>> {
        let RemoteId::Page(page) = remote_id else {
            return Err(Error::adapter_call(remote_id, "only pages have history"));
        };

        let dir = self.page_dir(page).join(REVISIONS_DIR);
        let entries = fs::read_dir(&dir).map_err(|e| Error::adapter_call(remote_id, e))?;

        let mut history = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let Some(revision) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !revision.starts_with('0') {
                continue;
            }
            history.insert(
                revision,
                Revision {
                    timestamp: modified_time(&entry.path())?,
                    attrs: BTreeMap::new(),
                },
            );
        }
        Ok(history)
    }
}
