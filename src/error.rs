use std::path::PathBuf;

use thiserror::Error;

use crate::docmap::RemoteId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no gitpub tracking branch '{branch}' in this repository")]
    NoSuchRemoteBranch { branch: String },

    #[error("not on a gitpub tracking branch (current branch: {current})")]
    NotOnTrackingBranch { current: String },

    #[error("`{command}` failed ({status}): {stderr}")]
    VersionControlCommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The commit command itself failed; the tracking branch stays checked
    /// out so its index can be inspected
    #[error("commit on the tracking branch failed: {0}")]
    CommitFailed(#[source] Box<Error>),

    #[error("remote adapter '{adapter}' does not support {capability}")]
    AdapterCapabilityMissing {
        adapter: String,
        capability: &'static str,
    },

    #[error("unresolved references remain in: {}", paths.join(", "))]
    UnresolvedReference { paths: Vec<String> },

    #[error("adapter call failed for {target}: {message}")]
    AdapterCallFailed { target: String, message: String },

    #[error("no staged changes to commit")]
    NothingStaged,

    #[error("document '{0}' is not in the document map")]
    DocumentNotMapped(String),

    #[error("invalid remote spec '{spec}': {reason}")]
    InvalidRemoteSpec { spec: String, reason: String },

    #[error("unknown remote adapter type '{0}'")]
    UnknownAdapter(String),

    #[error("invalid remote id '{0}'")]
    InvalidRemoteId(String),

    #[error("path {path:?} is not inside repository {root:?}")]
    PathOutsideRepository { path: PathBuf, root: PathBuf },

    #[error("{0:?} is not inside a git repository")]
    NotARepository(PathBuf),

    #[error("remote '{0}' has no document map; add it with `gitpub remote add` first")]
    RemoteNotInitialized(String),

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap an io error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn commit_failed(source: Error) -> Self {
        Error::CommitFailed(Box::new(source))
    }

    pub fn adapter_call(target: &RemoteId, message: impl ToString) -> Self {
        Error::AdapterCallFailed {
            target: target.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
