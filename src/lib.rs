#![deny(clippy::mod_module_files)]
//! gitpub: keep documents in a git repository published on a blog or wiki.
//!
//! Each remote has a document map (local path <-> remote id) committed on a
//! tracking branch `gpremotes/<remote>/<branch>`. Pushing diffs the map
//! against the snapshot taken at the last push and sends only the changes;
//! fetching imports remote documents, replaying revision history as commits
//! when the remote keeps one.

pub mod adapter;
pub mod binding;
pub mod config;
pub mod docmap;
pub mod document;
pub mod error;
pub mod hash;
pub mod tracking;
pub mod vcs;

pub use error::{Error, Result};
