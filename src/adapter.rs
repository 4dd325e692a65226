//! Remote adapter contract.
//!
//! Every adapter publishes, updates, deletes and lists documents. Adapters
//! that can read documents back implement [`FetchRemote`], and those that
//! also expose revision history implement [`HistoryRemote`]. The
//! [`Adapter`] enum records which of these an adapter provides, so
//! capability checks happen once, when the adapter is constructed.

mod links;
mod spec;
mod wiki;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub use links::{rewrite_doc_refs, DocRef, LinkResolver};
pub use spec::RemoteSpec;
pub use wiki::WikiExport;

use crate::{
    docmap::{DocRecord, RemoteAttrs, RemoteId},
    document::Document,
    error::{Error, Result},
};

/// Remote document listing: remote id -> adapter attributes
pub type Listing = BTreeMap<RemoteId, BTreeMap<String, String>>;

/// Base capability set required of every remote adapter
pub trait RemoteAdapter {
    /// Adapter type name, as written in remote specs
    fn kind(&self) -> &'static str;

    /// Publish a new document. The returned attributes must carry the remote
    /// id, and a remote path if the remote supports cross references.
    fn publish(
        &mut self,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<RemoteAttrs>;

    /// Replace the content of a published document, optionally returning
    /// attributes that replace the recorded ones.
    ///
    /// Remotes without in-place edits get delete followed by publish.
    fn update(
        &mut self,
        remote_id: &RemoteId,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<Option<RemoteAttrs>> {
        self.delete(remote_id)?;
        self.publish(doc, record, links).map(Some)
    }

    fn delete(&mut self, remote_id: &RemoteId) -> Result<()>;

    /// Enumerate the remote documents the remote can list
    fn list(&mut self) -> Result<Listing>;
}

/// Adapters that can retrieve documents
pub trait FetchRemote: RemoteAdapter {
    /// Retrieve a document, at `revision` when given, else the current one
    fn fetch_one(
        &mut self,
        remote_id: &RemoteId,
        revision: Option<&str>,
    ) -> Result<(Document, RemoteAttrs)>;
}

/// One remote revision of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub timestamp: DateTime<Utc>,
    pub attrs: BTreeMap<String, String>,
}

/// Adapters that expose per-document revision history
pub trait HistoryRemote: FetchRemote {
    /// All revisions of a document: revision id -> revision info
    fn fetch_history(&mut self, remote_id: &RemoteId) -> Result<BTreeMap<String, Revision>>;
}

/// A remote adapter tagged with the capabilities it provides
pub enum Adapter {
    Basic(Box<dyn RemoteAdapter>),
    Fetchable(Box<dyn FetchRemote>),
    HistoryCapable(Box<dyn HistoryRemote>),
}

impl Adapter {
    /// Construct the adapter named by `spec`
    pub fn connect(spec: &RemoteSpec) -> Result<Self> {
        match spec.adapter_type.as_str() {
            WikiExport::KIND => Ok(Adapter::HistoryCapable(Box::new(WikiExport::from_spec(
                spec,
            )?))),
            other => Err(Error::UnknownAdapter(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Adapter::Basic(a) => a.kind(),
            Adapter::Fetchable(a) => a.kind(),
            Adapter::HistoryCapable(a) => a.kind(),
        }
    }

    pub fn supports_fetch(&self) -> bool {
        !matches!(self, Adapter::Basic(_))
    }

    pub fn supports_history(&self) -> bool {
        matches!(self, Adapter::HistoryCapable(_))
    }

    /// Fail unless the adapter can fetch documents
    pub fn require_fetch(&self) -> Result<()> {
        if self.supports_fetch() {
            Ok(())
        } else {
            Err(self.missing("fetch"))
        }
    }

    /// Fail unless the adapter exposes revision history
    pub fn require_history(&self) -> Result<()> {
        if self.supports_history() {
            Ok(())
        } else {
            Err(self.missing("revision history"))
        }
    }

    fn missing(&self, capability: &'static str) -> Error {
        Error::AdapterCapabilityMissing {
            adapter: self.kind().to_string(),
            capability,
        }
    }

    pub fn publish(
        &mut self,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<RemoteAttrs> {
        let attrs = match self {
            Adapter::Basic(a) => a.publish(doc, record, links),
            Adapter::Fetchable(a) => a.publish(doc, record, links),
            Adapter::HistoryCapable(a) => a.publish(doc, record, links),
        }?;
        if attrs.remote_id.is_none() {
            return Err(Error::AdapterCallFailed {
                target: record.path.clone(),
                message: "publish returned no remote id".to_string(),
            });
        }
        Ok(attrs)
    }

    pub fn update(
        &mut self,
        remote_id: &RemoteId,
        doc: &Document,
        record: &DocRecord,
        links: &mut LinkResolver<'_>,
    ) -> Result<Option<RemoteAttrs>> {
        match self {
            Adapter::Basic(a) => a.update(remote_id, doc, record, links),
            Adapter::Fetchable(a) => a.update(remote_id, doc, record, links),
            Adapter::HistoryCapable(a) => a.update(remote_id, doc, record, links),
        }
    }

    pub fn delete(&mut self, remote_id: &RemoteId) -> Result<()> {
        match self {
            Adapter::Basic(a) => a.delete(remote_id),
            Adapter::Fetchable(a) => a.delete(remote_id),
            Adapter::HistoryCapable(a) => a.delete(remote_id),
        }
    }

    pub fn list(&mut self) -> Result<Listing> {
        match self {
            Adapter::Basic(a) => a.list(),
            Adapter::Fetchable(a) => a.list(),
            Adapter::HistoryCapable(a) => a.list(),
        }
    }

    pub fn fetch_one(
        &mut self,
        remote_id: &RemoteId,
        revision: Option<&str>,
    ) -> Result<(Document, RemoteAttrs)> {
        match self {
            Adapter::Basic(_) => Err(self.missing("fetch")),
            Adapter::Fetchable(a) => a.fetch_one(remote_id, revision),
            Adapter::HistoryCapable(a) => a.fetch_one(remote_id, revision),
        }
    }

    pub fn fetch_history(&mut self, remote_id: &RemoteId) -> Result<BTreeMap<String, Revision>> {
        match self {
            Adapter::HistoryCapable(a) => a.fetch_history(remote_id),
            _ => Err(self.missing("revision history")),
        }
    }
}
