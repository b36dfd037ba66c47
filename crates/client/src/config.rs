//! Client configuration: saved repositories and the cache location.

use crate::error::{ClientError, ClientResult};
use crate::url::RepoUrl;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DEPOT_CLIENT_CONFIG";

/// Client configuration file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local cache directory. Defaults to `cache/` next to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Saved repository URLs.
    #[serde(default)]
    pub repos: Vec<String>,
}

impl ClientConfig {
    /// Whether a URL naming the same repository is saved.
    pub fn contains(&self, url: &RepoUrl) -> bool {
        self.position(url).is_some()
    }

    fn position(&self, url: &RepoUrl) -> Option<usize> {
        self.repos.iter().position(|saved| {
            saved == url.as_str()
                || RepoUrl::parse(saved).is_ok_and(|saved| saved.same_repository(url))
        })
    }

    /// Save a repository URL.
    pub fn add(&mut self, url: &str) -> ClientResult<()> {
        let url = RepoUrl::parse(url)?;
        if self.contains(&url) {
            return Err(ClientError::Config(format!(
                "repository already exists: {url}"
            )));
        }
        self.repos.push(url.as_str().to_string());
        Ok(())
    }

    /// Forget a saved repository URL.
    pub fn remove(&mut self, url: &str) -> ClientResult<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::InvalidUrl("empty url".to_string()));
        }
        // Entries that no longer parse can still be removed verbatim.
        let position = match RepoUrl::parse(url) {
            Ok(parsed) => self.position(&parsed),
            Err(_) => self.repos.iter().position(|saved| saved == url),
        }
        .ok_or_else(|| ClientError::Config(format!("repository does not exist: {url}")))?;
        self.repos.remove(position);
        Ok(())
    }

    /// Effective cache directory for a config stored at `config_path`.
    pub fn cache_dir(&self, config_path: &Path) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("cache"),
        }
    }

    /// Resolve the config file path: explicit, then `DEPOT_CLIENT_CONFIG`,
    /// then `$XDG_CONFIG_HOME/depot/client.toml`, then
    /// `~/.config/depot/client.toml`.
    pub fn path(explicit: Option<&Path>) -> ClientResult<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let base = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var_os("HOME").ok_or_else(|| {
                    ClientError::Config(format!("HOME not set; set {CONFIG_ENV}"))
                })?;
                PathBuf::from(home).join(".config")
            }
        };

        Ok(base.join("depot").join("client.toml"))
    }

    /// Load from `path` merged with `DEPOT_`-prefixed environment variables.
    /// A missing file is an empty config.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let mut figment = Figment::new();
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("DEPOT_").only(&["cache_dir"]));

        match figment.extract() {
            Ok(config) => Ok(config),
            Err(_) if !path.exists() => Ok(Self::default()),
            Err(err) => Err(ClientError::Config(format!(
                "failed to load client configuration: {err}"
            ))),
        }
    }

    /// Write to `path` readable only by the owner.
    pub async fn save(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to encode client config: {e}")))?;
        tokio::fs::write(path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(path, perms).await?;
        }

        Ok(())
    }
}
