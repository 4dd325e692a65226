//! Cross-document references and their rewriting for a remote.
//!
//! Local documents reference each other with the reST `:doc:` role, either
//! ``:doc:`target` `` or ``:doc:`label <target>` ``, where `target` is a path
//! relative to the referencing document.

use std::collections::BTreeSet;

use crate::{docmap::DocumentMap, document};

/// Resolves local reference targets to remote paths while an adapter renders
/// one document, accumulating the targets that have no remote path yet.
///
/// The caller creates one resolver per render call, hands it to the adapter,
/// and inspects [`unresolved`](Self::unresolved) afterwards.
pub struct LinkResolver<'a> {
    map: &'a DocumentMap,
    doc_path: &'a str,
    unresolved: BTreeSet<String>,
}

impl<'a> LinkResolver<'a> {
    pub fn new(map: &'a DocumentMap, doc_path: &'a str) -> Self {
        LinkResolver {
            map,
            doc_path,
            unresolved: BTreeSet::new(),
        }
    }

    /// Look up the remote path of `target`, recording it as unresolved when
    /// the target is unmapped or not yet published
    pub fn resolve(&mut self, target: &str) -> Option<String> {
        let remote_path = document::resolve_relative(self.doc_path, target)
            .and_then(|path| self.map.get(&path))
            .and_then(|record| record.remote_path.clone());
        if remote_path.is_none() {
            self.unresolved.insert(target.to_string());
        }
        remote_path
    }

    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// A `:doc:` reference found in document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRef<'t> {
    pub label: &'t str,
    pub target: &'t str,
}

/// Split the inside of a `:doc:` role into label and target
fn parse_role(inner: &str) -> DocRef<'_> {
    if let Some(stripped) = inner.strip_suffix('>') {
        if let Some(pos) = stripped.rfind(" <") {
            return DocRef {
                label: stripped[..pos].trim(),
                target: stripped[pos + 2..].trim(),
            };
        }
    }
    DocRef {
        label: inner.trim(),
        target: inner.trim(),
    }
}

/// Replace every `:doc:` reference in `text` with the output of `render`.
///
/// `render` receives the reference and the resolved remote path (if any);
/// unterminated roles are copied through unchanged.
pub fn rewrite_doc_refs<F>(text: &str, resolver: &mut LinkResolver<'_>, mut render: F) -> String
where
    F: FnMut(&DocRef<'_>, Option<&str>) -> String,
{
    const ROLE: &str = ":doc:`";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(ROLE) {
        let after = &rest[start + ROLE.len()..];
        let Some(end) = after.find('`') else {
            break;
        };

        out.push_str(&rest[..start]);
        let doc_ref = parse_role(&after[..end]);
        let remote_path = resolver.resolve(doc_ref.target);
        out.push_str(&render(&doc_ref, remote_path.as_deref()));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
