//! Repository endpoints under `/app/v1/{namespace}/{repository}`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use depot_core::{ContentDigest, RepoId};
use depot_metadata::SignatureStatus;
use serde::Serialize;

/// Request header carrying `sha512:<hex>` of an upload body.
pub const DIGEST_HEADER: &str = "digest";

const PEM_CONTENT_TYPE: &str = "application/x-pem-file";
const OCTET_STREAM: &str = "application/octet-stream";

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub name: String,
    /// Hex SHA-512 recorded in the manifest.
    pub digest: String,
    /// Whether an artifact with the same name was replaced.
    pub replaced: bool,
    /// Whether the updated manifest was signed.
    pub signed: bool,
    /// Why signing failed, when it did. The stored signature is stale.
    pub signature_error: Option<String>,
}

fn repo_id(namespace: String, repository: String) -> ApiResult<RepoId> {
    let repo = RepoId::app_v1(namespace, repository);
    repo.validate()?;
    Ok(repo)
}

fn raw(content_type: &'static str, data: Bytes) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, content_type)], data).into_response()
}

/// Parse the optional `Digest` header.
fn declared_digest(headers: &HeaderMap) -> ApiResult<Option<ContentDigest>> {
    let Some(value) = headers.get(DIGEST_HEADER) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("digest header is not ASCII".to_string()))?;
    Ok(Some(ContentDigest::from_digest_header(value)?))
}

/// GET /app/v1/{namespace}/{repository}
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Json<Vec<String>>> {
    let repo = repo_id(namespace, repository)?;
    let service = state.repos.open(repo).await?;
    Ok(Json(service.list()))
}

/// GET /app/v1/{namespace}/{repository}/pubkey
///
/// Creates the namespace keypair on first use.
pub async fn get_public_key(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    let repo = repo_id(namespace, repository)?;
    let key_manager = state
        .key_manager()
        .ok_or_else(|| ApiError::NotFound("manifest signing is not configured".to_string()))?;
    let pem = key_manager.public_key(&repo.namespace_id()).await?;
    Ok(raw(PEM_CONTENT_TYPE, pem))
}

/// GET /app/v1/{namespace}/{repository}/meta
pub async fn get_meta(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    let repo = repo_id(namespace, repository)?;
    let service = state.repos.open(repo).await?;
    let data = service.meta().await?;
    Ok(raw("application/json", data))
}

/// GET /app/v1/{namespace}/{repository}/metasign
pub async fn get_meta_signature(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
) -> ApiResult<Response> {
    let repo = repo_id(namespace, repository)?;
    let service = state.repos.open(repo).await?;
    let data = service.meta_signature().await?;
    Ok(raw(OCTET_STREAM, data))
}

/// GET /app/v1/{namespace}/{repository}/blob/{name}
pub async fn get_blob(
    State(state): State<AppState>,
    Path((namespace, repository, name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let repo = repo_id(namespace, repository)?;
    let service = state.repos.open(repo).await?;
    let data = service.artifact(&name).await?;
    Ok(raw(OCTET_STREAM, data))
}

/// PUT /app/v1/{namespace}/{repository}/{name}
pub async fn put_artifact(
    State(state): State<AppState>,
    Path((namespace, repository, name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    let repo = repo_id(namespace, repository)?;
    let declared = declared_digest(&headers)?;

    let mut service = state.repos.open(repo).await?;
    let upload = service
        .put_artifact(&name, body, declared.as_ref())
        .await?;

    let signature_error = match &upload.outcome.signature {
        SignatureStatus::Failed(reason) => Some(reason.clone()),
        SignatureStatus::Signed | SignatureStatus::Unsigned => None,
    };
    let digest = upload
        .entry
        .primary_hash()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Internal(format!("{name} recorded without a hash")))?;

    Ok(Json(UploadResponse {
        name: upload.entry.full_name.clone(),
        digest,
        replaced: upload.replaced,
        signed: upload.outcome.is_signed(),
        signature_error,
    }))
}

/// DELETE /app/v1/{namespace}/{repository}/{name}
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path((namespace, repository, name)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let repo = repo_id(namespace, repository)?;
    let mut service = state.repos.open(repo).await?;
    let outcome = service.delete_artifact(&name).await?;
    if let SignatureStatus::Failed(reason) = &outcome.signature {
        tracing::warn!(name = %name, reason = %reason, "manifest re-signing failed after delete");
    }
    Ok(StatusCode::NO_CONTENT)
}
