//! Integration tests for the repository HTTP endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use common::TestServer;
use common::fixtures::{seeded_bytes, widget_name};
use depot_core::{ContentDigest, Manifest, RepoId};
use serde_json::Value;
use tower::ServiceExt;

const REPO: &str = "/app/v1/acme/widgets";

/// Send a request and collect the response body.
async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    digest: Option<&str>,
    body: Option<Bytes>,
) -> (StatusCode, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(digest) = digest {
        builder = builder.header("Digest", digest);
    }
    let body = body.map(Body::from).unwrap_or_else(Body::empty);

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

fn json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

#[tokio::test]
async fn health_reports_backend_and_signing() {
    let server = TestServer::new().await;
    let (status, body) = request(&server.router, "GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "filesystem");
    assert_eq!(body["signing"], true);

    let server = TestServer::unsigned().await;
    let (_, body) = request(&server.router, "GET", "/v1/health", None, None).await;
    assert_eq!(json(&body)["signing"], false);
}

#[tokio::test]
async fn unsigned_repository_serves_manifest_without_signature() {
    let server = TestServer::unsigned().await;
    let name = widget_name("latest");

    let (status, body) = request(
        &server.router,
        "PUT",
        &format!("{REPO}/{name}"),
        None,
        Some(Bytes::from_static(b"widget")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let receipt = json(&body);
    assert_eq!(receipt["name"], name.as_str());
    assert_eq!(receipt["signed"], false);
    assert_eq!(receipt["signature_error"], Value::Null);
    assert_eq!(
        receipt["digest"],
        ContentDigest::compute(b"widget").to_hex().as_str()
    );

    let (status, body) = request(&server.router, "GET", REPO, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!([name]));

    let (status, body) = request(&server.router, "GET", &format!("{REPO}/meta"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let manifest = Manifest::from_bytes(&body).unwrap();
    assert_eq!(manifest.repo_id(), RepoId::app_v1("acme", "widgets"));
    assert_eq!(manifest.names(), vec![name.clone()]);

    let (status, body) =
        request(&server.router, "GET", &format!("{REPO}/metasign"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "metadata_error");

    let (status, body) = request(&server.router, "GET", &format!("{REPO}/pubkey"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "not_found");
}

#[tokio::test]
async fn signed_manifest_verifies_against_public_key() {
    let server = TestServer::new().await;
    let name = widget_name("1.0");
    let data = seeded_bytes(7, 4096);
    let digest = ContentDigest::compute(&data);

    let (status, body) = request(
        &server.router,
        "PUT",
        &format!("{REPO}/{name}"),
        Some(&digest.to_digest_header()),
        Some(data.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body:?}");
    assert_eq!(json(&body)["signed"], true);

    let (_, meta) = request(&server.router, "GET", &format!("{REPO}/meta"), None, None).await;
    let (_, sig) = request(&server.router, "GET", &format!("{REPO}/metasign"), None, None).await;
    let (status, pem) = request(&server.router, "GET", &format!("{REPO}/pubkey"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pem.starts_with(b"-----BEGIN PUBLIC KEY-----"));

    depot_signer::verify_sha256(&pem, &meta, &sig).unwrap();

    let (status, blob) = request(
        &server.router,
        "GET",
        &format!("{REPO}/blob/{name}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blob, data);

    // Another repository in the namespace shares the key.
    let (_, other_pem) = request(
        &server.router,
        "GET",
        "/app/v1/acme/gadgets/pubkey",
        None,
        None,
    )
    .await;
    assert_eq!(other_pem, pem);
}

#[tokio::test]
async fn digest_mismatch_is_rejected_and_nothing_is_stored() {
    let server = TestServer::new().await;
    let wrong = ContentDigest::compute(b"something else").to_digest_header();

    let (status, body) = request(
        &server.router,
        "PUT",
        &format!("{REPO}/widget"),
        Some(&wrong),
        Some(Bytes::from_static(b"widget")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "hash_mismatch");

    let (status, _) = request(&server.router, "GET", &format!("{REPO}/blob/widget"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(
        !server
            .store
            .exists("app/v1/acme/widgets/widget")
            .await
            .unwrap()
    );

    let (status, body) = request(
        &server.router,
        "PUT",
        &format!("{REPO}/widget"),
        Some("sha256:abcd"),
        Some(Bytes::from_static(b"widget")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "core_error");
}

#[tokio::test]
async fn reserved_and_missing_names() {
    let server = TestServer::new().await;

    let (status, _) = request(
        &server.router,
        "PUT",
        &format!("{REPO}/meta.json"),
        None,
        Some(Bytes::from_static(b"{}")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&server.router, "GET", &format!("{REPO}/blob/absent"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(&server.router, "DELETE", &format!("{REPO}/absent"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "metadata_error");
}

#[tokio::test]
async fn reupload_replaces_and_delete_removes() {
    let server = TestServer::new().await;
    let uri = format!("{REPO}/widget");

    let (_, first) = request(&server.router, "PUT", &uri, None, Some(seeded_bytes(1, 64))).await;
    assert_eq!(json(&first)["replaced"], false);
    let (_, second) = request(&server.router, "PUT", &uri, None, Some(seeded_bytes(2, 64))).await;
    assert_eq!(json(&second)["replaced"], true);

    let (_, body) = request(&server.router, "GET", REPO, None, None).await;
    assert_eq!(json(&body), serde_json::json!(["widget"]));

    let (_, blob) = request(&server.router, "GET", &format!("{REPO}/blob/widget"), None, None).await;
    assert_eq!(blob, seeded_bytes(2, 64));

    let (status, _) = request(&server.router, "DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&server.router, "GET", REPO, None, None).await;
    assert_eq!(json(&body), serde_json::json!([]));
    let (status, _) = request(&server.router, "GET", &format!("{REPO}/blob/widget"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_repository_segments_are_rejected() {
    let server = TestServer::new().await;
    let (status, _) = request(&server.router, "GET", "/app/v1/acme/../meta", None, None).await;
    assert_ne!(status, StatusCode::OK);

    let (status, _) = request(&server.router, "GET", "/app/v1/acme/.", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
