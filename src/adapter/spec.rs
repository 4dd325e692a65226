use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Adapter type plus the arguments used to construct it.
///
/// Written from the command line as `type:host-spec[:key=value...]`, where
/// `host-spec` is `user@host` or just `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub adapter_type: String,
    pub args: BTreeMap<String, String>,
}

impl RemoteSpec {
    pub fn new(adapter_type: impl Into<String>, args: BTreeMap<String, String>) -> Self {
        RemoteSpec {
            adapter_type: adapter_type.into(),
            args,
        }
    }

    /// Parse a remote spec, filling in `default_user` when the host spec
    /// names no user
    pub fn parse(spec: &str, default_user: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRemoteSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = spec.split(':');
        let adapter_type = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing adapter type"))?;
        let host_spec = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing host"))?;

        let (user, host) = match host_spec.split_once('@') {
            Some((user, host)) if !user.is_empty() && !host.is_empty() => (user, host),
            Some(_) => return Err(invalid("malformed user@host")),
            None => (default_user, host_spec),
        };

        let mut args = BTreeMap::new();
        args.insert("host".to_string(), host.to_string());
        args.insert("user".to_string(), user.to_string());

        for arg in parts {
            let (key, value) = arg
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| invalid("trailing arguments must be key=value"))?;
            args.insert(key.to_string(), value.to_string());
        }

        Ok(RemoteSpec::new(adapter_type, args))
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_at_host() {
        let spec = RemoteSpec::parse("wordpress:bob@example.com:blog_id=3", "alice").unwrap();
        assert_eq!(spec.adapter_type, "wordpress");
        assert_eq!(spec.arg("host"), Some("example.com"));
        assert_eq!(spec.arg("user"), Some("bob"));
        assert_eq!(spec.arg("blog_id"), Some("3"));
    }

    #[test]
    fn test_parse_defaults_user() {
        let spec = RemoteSpec::parse("wiki:/srv/wiki", "alice").unwrap();
        assert_eq!(spec.arg("host"), Some("/srv/wiki"));
        assert_eq!(spec.arg("user"), Some("alice"));
        assert_eq!(spec.args.len(), 2);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let spec = RemoteSpec::parse("wiki:host:path=/a=b", "alice").unwrap();
        assert_eq!(spec.arg("path"), Some("/a=b"));
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "wiki", "wiki:", ":host", "wiki:@host", "wiki:host:novalue", "wiki:host:=x"] {
            assert!(
                matches!(
                    RemoteSpec::parse(bad, "alice"),
                    Err(Error::InvalidRemoteSpec { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
