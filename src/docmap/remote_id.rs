use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identity of a document on the remote side.
///
/// Encoded as a single string with a type tag:
/// - `page:{id}` - a page (blog page, wiki page)
/// - `post:{id}` - a blog post
/// - `file:{path}` - an uploaded file or attachment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RemoteId {
    Page(String),
    Post(String),
    File(String),
}

impl RemoteId {
    /// Parse an encoded remote id
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        let (tag, id) = encoded
            .split_once(':')
            .ok_or_else(|| Error::InvalidRemoteId(encoded.to_string()))?;
        if id.is_empty() {
            return Err(Error::InvalidRemoteId(encoded.to_string()));
        }

        match tag {
            "page" => Ok(RemoteId::Page(id.to_string())),
            "post" => Ok(RemoteId::Post(id.to_string())),
            "file" => Ok(RemoteId::File(id.to_string())),
            _ => Err(Error::InvalidRemoteId(encoded.to_string())),
        }
    }

    /// The untagged identifier
    pub fn id(&self) -> &str {
        match self {
            RemoteId::Page(id) | RemoteId::Post(id) | RemoteId::File(id) => id,
        }
    }

    /// Encode back to the tagged string form
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Page(id) => write!(f, "page:{}", id),
            RemoteId::Post(id) => write!(f, "post:{}", id),
            RemoteId::File(path) => write!(f, "file:{}", path),
        }
    }
}

impl FromStr for RemoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemoteId::parse(s)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RemoteId::parse(&value)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_ids() {
        assert_eq!(
            RemoteId::parse("page:123").unwrap(),
            RemoteId::Page("123".to_string())
        );
        assert_eq!(
            RemoteId::parse("post:45").unwrap(),
            RemoteId::Post("45".to_string())
        );
        assert_eq!(
            RemoteId::parse("file:/media/a.png").unwrap(),
            RemoteId::File("/media/a.png".to_string())
        );
    }

    #[test]
    fn test_file_path_may_contain_colons() {
        let id = RemoteId::parse("file:c:/x.png").unwrap();
        assert_eq!(id.id(), "c:/x.png");
        assert_eq!(id.encode(), "file:c:/x.png");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(RemoteId::parse("page123").is_err());
        assert!(RemoteId::parse("blob:1").is_err());
        assert!(RemoteId::parse("post:").is_err());
    }

    #[test]
    fn test_yaml_uses_string_form() {
        let yaml = serde_yaml::to_string(&RemoteId::Post("7".to_string())).unwrap();
        assert_eq!(yaml.trim(), "post:7");
        let back: RemoteId = serde_yaml::from_str("page:Home").unwrap();
        assert_eq!(back, RemoteId::Page("Home".to_string()));
    }
}
