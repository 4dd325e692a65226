use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::RemoteId;

/// Attributes of one mapped document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocRecord {
    /// Local path relative to the repository root. This is the map key, so it
    /// is not written out with the record.
    #[serde(skip)]
    pub path: String,

    /// Assigned by the remote on first publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,

    /// Remote locator used to rewrite cross-document references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,

    /// Content fingerprint as of the last successful synchronization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Remote artifact that the adapter's listing does not enumerate
    #[serde(default, skip_serializing_if = "is_false")]
    pub unlisted: bool,

    /// Remote revision id -> local commit that recorded it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub revision_commits: BTreeMap<String, String>,

    /// Adapter-defined attributes, passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl DocRecord {
    pub fn with_attrs(attrs: BTreeMap<String, String>) -> Self {
        DocRecord {
            attrs,
            ..Default::default()
        }
    }

    /// Fold attributes reported by the remote into this record
    pub fn merge(&mut self, update: RemoteAttrs) {
        if let Some(remote_id) = update.remote_id {
            self.remote_id = Some(remote_id);
        }
        if let Some(remote_path) = update.remote_path {
            self.remote_path = Some(remote_path);
        }
        if let Some(content_hash) = update.content_hash {
            self.content_hash = Some(content_hash);
        }
        if let Some(unlisted) = update.unlisted {
            self.unlisted = unlisted;
        }
        self.attrs.extend(update.attrs);
    }
}

/// Attributes reported by a remote adapter. Absent fields leave the record
/// untouched when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAttrs {
    pub remote_id: Option<RemoteId>,
    pub remote_path: Option<String>,
    pub content_hash: Option<String>,
    pub unlisted: Option<bool>,
    pub attrs: BTreeMap<String, String>,
}

impl RemoteAttrs {
    pub fn published(remote_id: RemoteId) -> Self {
        RemoteAttrs {
            remote_id: Some(remote_id),
            ..Default::default()
        }
    }

    pub fn with_remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = Some(remote_path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_fields_the_remote_omits() {
        let mut record = DocRecord {
            path: "a.rst".to_string(),
            remote_id: Some(RemoteId::Post("1".to_string())),
            content_hash: Some("h1".to_string()),
            ..Default::default()
        };
        record.attrs.insert("pubtype".to_string(), "post".to_string());

        let mut update = RemoteAttrs::default().with_remote_path("?p=1");
        update.attrs.insert("title".to_string(), "A".to_string());
        record.merge(update);

        assert_eq!(record.remote_id, Some(RemoteId::Post("1".to_string())));
        assert_eq!(record.remote_path.as_deref(), Some("?p=1"));
        assert_eq!(record.content_hash.as_deref(), Some("h1"));
        assert_eq!(record.attrs.len(), 2);
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let record = DocRecord {
            path: "a.rst".to_string(),
            content_hash: Some("abc".to_string()),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&record).unwrap();
        assert_eq!(yaml.trim(), "content_hash: abc");
    }
}
