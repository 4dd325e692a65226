//! Local documents: reStructuredText pages and binary media.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    hash,
};

const DEFAULT_TITLE: &str = "Untitled";

/// Content of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary { data: Vec<u8>, content_type: String },
}

/// A unit of content tracked under a local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub body: Body,
}

impl Document {
    /// Create a text document, taking the title from its reST heading
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let title = extract_title(&text).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        Document {
            title,
            body: Body::Text(text),
        }
    }

    pub fn binary(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Document {
            title: DEFAULT_TITLE.to_string(),
            body: Body::Binary {
                data,
                content_type: content_type.into(),
            },
        }
    }

    /// Read the document stored at `root/path`.
    ///
    /// Media extensions (see [`content_type_for`]) load as binary, everything
    /// else must be UTF-8 text.
    pub fn load(root: &Path, path: &str) -> Result<Self> {
        let full = root.join(path);
        match content_type_for(path) {
            Some(content_type) => {
                let data = fs::read(&full).map_err(|e| Error::io(&full, e))?;
                let mut doc = Document::binary(data, content_type);
                doc.title = file_name(path).to_string();
                Ok(doc)
            }
            None => {
                let text = fs::read_to_string(&full).map_err(|e| Error::io(&full, e))?;
                Ok(Document::text(text))
            }
        }
    }

    /// Write the document to `root/path`, creating parent directories
    pub fn write(&self, root: &Path, path: &str) -> Result<()> {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&full, self.bytes()).map_err(|e| Error::io(&full, e))
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.body {
            Body::Text(text) => text.as_bytes(),
            Body::Binary { data, .. } => data,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            Body::Binary { .. } => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.body, Body::Binary { .. })
    }

    /// Fingerprint of the document content
    pub fn content_hash(&self) -> String {
        match &self.body {
            Body::Text(text) => hash::text_hash(text),
            Body::Binary { data, .. } => hash::content_hash(data),
        }
    }
}

/// Guess the media type of a binary document from its extension.
/// Returns `None` for text documents.
pub fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Find the document title: the first text line underlined by a reST adornment
pub fn extract_title(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    for pair in lines.windows(2) {
        let candidate = pair[0].trim();
        if candidate.is_empty() || candidate.starts_with("..") || is_adornment(candidate) {
            continue;
        }
        let underline = pair[1].trim_end();
        if is_adornment(underline) && underline.chars().count() >= candidate.chars().count() {
            return Some(candidate.to_string());
        }
    }
    None
}

fn is_adornment(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) if first.is_ascii_punctuation() => chars.all(|c| c == first),
        _ => false,
    }
}

/// Resolve `target`, written inside the document at `doc_path`, to a
/// repository-relative path. A leading `/` anchors the target at the
/// repository root. Returns `None` if the result escapes the root.
pub fn resolve_relative(doc_path: &str, target: &str) -> Option<String> {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => PathBuf::from(absolute),
        None => Path::new(doc_path)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(target),
    };

    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Express `path` relative to the repository `root`.
///
/// Relative inputs are taken relative to the current directory.
pub fn repo_relative(root: &Path, path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io(path, e))?
            .join(path)
    };
    let relative = absolute
        .strip_prefix(root)
        .map_err(|_| Error::PathOutsideRepository {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let relative = relative.to_string_lossy().replace('\\', "/");
    resolve_relative("", &relative).ok_or_else(|| Error::PathOutsideRepository {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })
}
