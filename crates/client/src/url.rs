//! Repository URLs: `http(s)://host[:port]/namespace/repository`.

use crate::error::{ClientError, ClientResult};
use depot_core::repo::{
    META_FILE_NAME, META_SIGN_FILE_NAME, PROTO_APP, PUBLIC_KEY_FILE_NAME, VERSION_V1,
};
use depot_core::RepoId;
use reqwest::Url;
use std::fmt;

/// A parsed repository URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoUrl {
    raw: String,
    server: Url,
    host_key: String,
    namespace: String,
    repository: String,
}

impl RepoUrl {
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "{raw}: scheme must be http or https"
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidUrl(format!("{raw}: missing host")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let [namespace, repository] = segments.as_slice() else {
            return Err(ClientError::InvalidUrl(format!(
                "{raw}: expected http(s)://host/namespace/repository"
            )));
        };

        let repo = RepoId::app_v1(*namespace, *repository);
        repo.validate()?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let mut server = url.clone();
        server.set_path("/");
        server.set_query(None);
        server.set_fragment(None);

        Ok(Self {
            raw: raw.trim().to_string(),
            server,
            host_key: authority.replace(':', "_"),
            namespace: repo.namespace,
            repository: repo.repository,
        })
    }

    /// The URL as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `scheme://host[:port]/`.
    pub fn server(&self) -> &Url {
        &self.server
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Whether both URLs name the same repository on the same server,
    /// however they were spelled.
    pub fn same_repository(&self, other: &RepoUrl) -> bool {
        self.server == other.server
            && self.namespace == other.namespace
            && self.repository == other.repository
    }

    pub fn repo_id(&self) -> RepoId {
        RepoId::app_v1(&self.namespace, &self.repository)
    }

    /// Endpoint under `/app/v1/{namespace}/{repository}`. Segments are
    /// percent-encoded, so names like `widget:latest` stay one segment.
    pub fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.server.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(format!("{}: cannot be a base", self.raw)))?;
            path.clear()
                .extend([
                    PROTO_APP,
                    VERSION_V1,
                    self.namespace.as_str(),
                    self.repository.as_str(),
                ])
                .extend(segments);
        }
        Ok(url)
    }

    fn cache_prefix(&self) -> String {
        format!(
            "{}/{PROTO_APP}/{VERSION_V1}/{}/{}",
            self.host_key, self.namespace, self.repository
        )
    }

    /// Local cache key of the manifest.
    pub fn manifest_cache_key(&self) -> String {
        format!("{}/{META_FILE_NAME}", self.cache_prefix())
    }

    /// Local cache key of the manifest signature.
    pub fn signature_cache_key(&self) -> String {
        format!("{}/{META_SIGN_FILE_NAME}", self.cache_prefix())
    }

    /// Local cache key of the namespace public key.
    pub fn public_key_cache_key(&self) -> String {
        format!(
            "{}/{PROTO_APP}/{VERSION_V1}/{}/{PUBLIC_KEY_FILE_NAME}",
            self.host_key, self.namespace
        )
    }

    /// Local cache key of a downloaded artifact.
    pub fn blob_cache_key(&self, name: &str) -> ClientResult<String> {
        depot_core::repo::validate_artifact_name(name)?;
        Ok(format!("{}/blob/{name}", self.cache_prefix()))
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
