//! Remote repository endpoints.

use crate::error::{ClientError, ClientResult};
use crate::url::RepoUrl;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::ContentDigest;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying `sha512:<hex>` of an uploaded body.
pub const DIGEST_HEADER: &str = "digest";

/// Server acknowledgement of an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub name: String,
    /// Hex SHA-512 recorded in the manifest.
    pub digest: String,
    pub replaced: bool,
    /// Whether the updated manifest was signed.
    pub signed: bool,
}

/// The operations a client performs against one repository.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Artifact names, as the server lists them.
    async fn list(&self) -> ClientResult<Vec<String>>;

    /// PEM public key of the repository's namespace.
    async fn public_key(&self) -> ClientResult<Bytes>;

    /// Manifest bytes.
    async fn meta(&self) -> ClientResult<Bytes>;

    /// Manifest signature bytes.
    async fn meta_signature(&self) -> ClientResult<Bytes>;

    /// Artifact bytes.
    async fn blob(&self, name: &str) -> ClientResult<Bytes>;

    /// Upload an artifact with its digest.
    async fn put(&self, name: &str, data: Bytes, digest: &ContentDigest)
    -> ClientResult<UploadReceipt>;

    /// Remove an artifact and its manifest entry.
    async fn delete(&self, name: &str) -> ClientResult<()>;
}

/// [`RemoteRepository`] over HTTP.
#[derive(Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    url: RepoUrl,
}

impl HttpRemote {
    pub fn new(url: RepoUrl) -> ClientResult<Self> {
        Self::with_timeout(url, None)
    }

    /// Apply `timeout` to every request. It is the only timeout in the
    /// client.
    pub fn with_timeout(url: RepoUrl, timeout: Option<Duration>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            url,
        })
    }

    pub fn url(&self) -> &RepoUrl {
        &self.url
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_bytes(&self, segments: &[&str]) -> ClientResult<Bytes> {
        let url = self.url.endpoint(segments)?;
        let response = self.send(self.http.get(url)).await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl RemoteRepository for HttpRemote {
    async fn list(&self) -> ClientResult<Vec<String>> {
        let url = self.url.endpoint(&[])?;
        let response = self.send(self.http.get(url)).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::Config(format!("invalid list response: {e}")))
    }

    async fn public_key(&self) -> ClientResult<Bytes> {
        self.get_bytes(&["pubkey"]).await
    }

    async fn meta(&self) -> ClientResult<Bytes> {
        self.get_bytes(&["meta"]).await
    }

    async fn meta_signature(&self) -> ClientResult<Bytes> {
        self.get_bytes(&["metasign"]).await
    }

    async fn blob(&self, name: &str) -> ClientResult<Bytes> {
        self.get_bytes(&["blob", name]).await
    }

    async fn put(
        &self,
        name: &str,
        data: Bytes,
        digest: &ContentDigest,
    ) -> ClientResult<UploadReceipt> {
        let url = self.url.endpoint(&[name])?;
        let header = HeaderValue::from_str(&digest.to_digest_header())
            .map_err(|e| ClientError::Config(format!("invalid digest header: {e}")))?;
        let response = self
            .send(self.http.put(url).header(DIGEST_HEADER, header).body(data))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, name: &str) -> ClientResult<()> {
        let url = self.url.endpoint(&[name])?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}
