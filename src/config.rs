use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Expand tilde (~) in path to user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for gitpub
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitpubConfig {
    /// Directory, relative to the repository root, holding document maps
    #[serde(default = "defaults::map_dir")]
    pub map_dir: String,
    /// Directory, relative to the repository root, that receives documents
    /// first seen on a remote. `{remote}` is replaced by the remote name.
    #[serde(default = "defaults::import_dir")]
    pub import_dir: String,
    /// Local branch whose tracking branch is used when none is named
    #[serde(default = "defaults::default_branch")]
    pub default_branch: String,
    /// User for remote specs that name none; falls back to `$USER`
    #[serde(default)]
    pub default_user: Option<String>,
}

impl Default for GitpubConfig {
    fn default() -> Self {
        GitpubConfig {
            map_dir: defaults::map_dir(),
            import_dir: defaults::import_dir(),
            default_branch: defaults::default_branch(),
            default_user: None,
        }
    }
}

impl GitpubConfig {
    /// Load configuration from the config file (if present) and environment
    /// variables
    pub fn load() -> Result<Self> {
        let config_path = match env::var("GITPUB_CONFIG") {
            Ok(path) => expand_tilde(Path::new(&path)),
            Err(_) => Self::config_file_path()?,
        };
        tracing::debug!("loading gitpub config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            GitpubConfig::default()
        };

        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `GITPUB_*` variables, looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(map_dir) = lookup("GITPUB_MAP_DIR") {
            self.map_dir = map_dir;
        }
        if let Some(import_dir) = lookup("GITPUB_IMPORT_DIR") {
            self.import_dir = import_dir;
        }
        if let Some(branch) = lookup("GITPUB_DEFAULT_BRANCH") {
            self.default_branch = branch;
        }
        if let Some(user) = lookup("GITPUB_USER") {
            self.default_user = Some(user);
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/gitpub/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// User name for remote specs without `user@`
    pub fn user(&self) -> String {
        self.default_user
            .clone()
            .or_else(|| env::var("USER").ok())
            .unwrap_or_else(|| "gitpub".to_string())
    }

    /// Import directory for `remote`
    pub fn import_dir_for(&self, remote: &str) -> String {
        self.import_dir.replace("{remote}", remote)
    }
}

mod defaults {
    pub(crate) fn map_dir() -> String {
        ".gitpub".to_string()
    }

    pub(crate) fn import_dir() -> String {
        "{remote}-import".to_string()
    }

    pub(crate) fn default_branch() -> String {
        "master".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "map_dir: .maps\ndefault_user: alice\n").unwrap();

        let loaded = GitpubConfig::load_from_file(&config_path).unwrap();
        let expected = GitpubConfig {
            map_dir: ".maps".to_string(),
            default_user: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "default_branch: main\n").unwrap();

        let loaded = GitpubConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.default_branch, "main");
        assert_eq!(loaded.map_dir, ".gitpub");
        assert_eq!(loaded.import_dir_for("blog"), "blog-import");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "cache_dir: /tmp\n").unwrap();

        assert!(GitpubConfig::load_from_file(&config_path).is_err());
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = [
            ("GITPUB_MAP_DIR", ".maps"),
            ("GITPUB_USER", "bob"),
            ("GITPUB_DEFAULT_BRANCH", "main"),
        ]
        .into_iter()
        .collect();

        let mut config = GitpubConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.map_dir, ".maps");
        assert_eq!(config.user(), "bob");
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.import_dir, "{remote}-import");
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/wiki")), home.join("wiki"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
        assert_eq!(expand_tilde(Path::new("/srv/wiki")), PathBuf::from("/srv/wiki"));
    }
}
