//! Repository identity and the storage key space.
//!
//! Every blob lives under a slash-joined key:
//! - `{proto}/{version}/{namespace}/{repository}/{name}` for artifacts and the
//!   repository manifest (`meta.json`) and its signature (`meta.sign`)
//! - `{proto}/{version}/{namespace}/{pub_key.pem|priv_key.pem}` for the
//!   namespace keypair

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manifest file name within a repository.
pub const META_FILE_NAME: &str = "meta.json";

/// Manifest signature file name within a repository.
pub const META_SIGN_FILE_NAME: &str = "meta.sign";

/// Public key file name within a namespace.
pub const PUBLIC_KEY_FILE_NAME: &str = "pub_key.pem";

/// Private key file name within a namespace.
pub const PRIVATE_KEY_FILE_NAME: &str = "priv_key.pem";

/// Protocol name for application bundles.
pub const PROTO_APP: &str = "app";

/// Current protocol version.
pub const VERSION_V1: &str = "v1";

fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(Error::Validation(format!(
            "{field} must be a single path segment: {value}"
        )));
    }
    Ok(())
}

/// Identity of a namespace, the scope of one signing keypair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceId {
    pub proto: String,
    pub version: String,
    pub namespace: String,
}

impl NamespaceId {
    pub fn new(
        proto: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            proto: proto.into(),
            version: version.into(),
            namespace: namespace.into(),
        }
    }

    /// Check that every identity field is a non-empty path segment.
    pub fn validate(&self) -> Result<()> {
        validate_segment("proto", &self.proto)?;
        validate_segment("version", &self.version)?;
        validate_segment("namespace", &self.namespace)
    }

    /// Storage key prefix for this namespace.
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}", self.proto, self.version, self.namespace)
    }

    /// Storage key of the namespace public key.
    pub fn public_key_key(&self) -> String {
        format!("{}/{}", self.prefix(), PUBLIC_KEY_FILE_NAME)
    }

    /// Storage key of the namespace private key.
    pub fn private_key_key(&self) -> String {
        format!("{}/{}", self.prefix(), PRIVATE_KEY_FILE_NAME)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Identity of a repository: one manifest per `RepoId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub proto: String,
    pub version: String,
    pub namespace: String,
    pub repository: String,
}

impl RepoId {
    pub fn new(
        proto: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            proto: proto.into(),
            version: version.into(),
            namespace: namespace.into(),
            repository: repository.into(),
        }
    }

    /// The repository whose manifest is stored at `key`, if `key` is a
    /// manifest key.
    pub fn from_manifest_key(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('/').collect();
        match parts.as_slice() {
            [proto, version, namespace, repository, file] if *file == META_FILE_NAME => {
                let repo = Self::new(*proto, *version, *namespace, *repository);
                repo.validate().ok().map(|()| repo)
            }
            _ => None,
        }
    }

    /// Repository under the `app/v1` protocol.
    pub fn app_v1(namespace: impl Into<String>, repository: impl Into<String>) -> Self {
        Self::new(PROTO_APP, VERSION_V1, namespace, repository)
    }

    /// Check that all four identity fields are non-empty path segments.
    pub fn validate(&self) -> Result<()> {
        self.namespace_id().validate()?;
        validate_segment("repository", &self.repository)
    }

    /// The namespace this repository belongs to.
    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.proto, &self.version, &self.namespace)
    }

    /// Storage key prefix for this repository.
    pub fn prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.proto, self.version, self.namespace, self.repository
        )
    }

    /// Storage key of the manifest.
    pub fn manifest_key(&self) -> String {
        format!("{}/{}", self.prefix(), META_FILE_NAME)
    }

    /// Storage key of the manifest signature.
    pub fn signature_key(&self) -> String {
        format!("{}/{}", self.prefix(), META_SIGN_FILE_NAME)
    }

    /// Storage key of an artifact.
    ///
    /// Rejects names that would escape the repository or shadow the
    /// manifest files.
    pub fn artifact_key(&self, name: &str) -> Result<String> {
        validate_artifact_name(name)?;
        Ok(format!("{}/{}", self.prefix(), name))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Validate an artifact name for use as the last segment of a storage key.
pub fn validate_artifact_name(name: &str) -> Result<()> {
    validate_segment("artifact name", name)?;
    if name == META_FILE_NAME || name == META_SIGN_FILE_NAME {
        return Err(Error::Validation(format!(
            "artifact name is reserved: {name}"
        )));
    }
    Ok(())
}

/// Descriptor of an appliance, used to derive its full name in a repository.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Appliance {
    pub proto: String,
    /// Only meaningful for `app`.
    pub os: String,
    /// Only meaningful for `app`.
    pub arch: String,
    pub name: String,
    pub tag: Option<String>,
}

impl Appliance {
    /// The name under which this appliance is recorded in a manifest.
    ///
    /// `app` bundles are `{os}-{arch}-{name}:{tag}`, everything else is
    /// `{name}:{tag}`. A missing tag means `latest`.
    pub fn full_name(&self) -> String {
        let tag = self
            .tag
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("latest");
        match self.proto.as_str() {
            PROTO_APP => format!("{}-{}-{}:{}", self.os, self.arch, self.name, tag),
            _ => format!("{}:{}", self.name, tag),
        }
    }
}
