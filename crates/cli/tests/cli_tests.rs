#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use depot_core::config::AppConfig;
use depot_server::{AppState, create_router};
use depot_signer::{KeyManager, PerNamespaceKeyManager};
use depot_storage::{MemoryBackend, StorageProvider};
use predicates::str::contains;
use std::fs;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const URL: &str = "http://127.0.0.1:8080/acme/widgets";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn depot_cmd(config: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("depot").unwrap();
    cmd.args(args).arg("--client-config").arg(config);
    cmd
}

async fn serve() -> SocketAddr {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("cli-data"));
    let keys: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("cli-keys"));
    let key_manager: Arc<dyn KeyManager> =
        Arc::new(PerNamespaceKeyManager::new(keys).with_key_bits(1024));
    let state = AppState::new(AppConfig::default(), store, Some(key_manager));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

#[test]
fn add_list_remove_repositories() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("client.toml");

    depot_cmd(&config_path, &["add", URL])
        .assert()
        .success()
        .stdout(contains("Added"));

    depot_cmd(&config_path, &["add", URL])
        .assert()
        .failure()
        .stderr(contains("already exists"));

    depot_cmd(&config_path, &["list"])
        .assert()
        .success()
        .stdout(contains(URL));

    let contents = fs::read_to_string(&config_path).unwrap();
    let value: toml::Value = toml::from_str(&contents).unwrap();
    let repos = value.get("repos").and_then(|v| v.as_array()).unwrap();
    assert_eq!(repos.len(), 1);

    depot_cmd(&config_path, &["remove", URL]).assert().success();
    depot_cmd(&config_path, &["remove", URL])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}

#[test]
fn add_rejects_malformed_urls() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("client.toml");

    for url in ["ftp://host/acme/widgets", "http://host/acme", "not a url"] {
        depot_cmd(&config_path, &["add", url])
            .assert()
            .failure()
            .stderr(contains("invalid repository url"));
    }
    assert!(!config_path.exists());
}

#[test]
fn client_config_from_environment() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("nested/client.toml");

    Command::cargo_bin("depot")
        .unwrap()
        .env("DEPOT_CLIENT_CONFIG", &config_path)
        .args(["add", URL])
        .assert()
        .success();
    assert!(config_path.exists());

    depot_cmd(&config_path, &["list"])
        .assert()
        .success()
        .stdout(contains(URL));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn push_sync_pull_delete_against_server() {
    if !can_bind_localhost() {
        eprintln!("Skipping server tests: cannot bind to localhost");
        return;
    }

    let addr = serve().await;
    let url = format!("http://{addr}/acme/widgets");

    tokio::task::spawn_blocking(move || {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("client.toml");
        let artifact = temp.path().join("widget.tar");
        fs::write(&artifact, b"widget bundle").unwrap();

        depot_cmd(&config_path, &["push", &url])
            .arg(&artifact)
            .args(["--name", "linux-amd64-widget:latest"])
            .assert()
            .success()
            .stdout(contains("Pushed linux-amd64-widget:latest"));

        depot_cmd(&config_path, &["sync", &url])
            .assert()
            .success()
            .stdout(contains("1 artifacts"));

        depot_cmd(&config_path, &["list", &url])
            .assert()
            .success()
            .stdout(contains("linux-amd64-widget:latest"));
        // Listing remembered the repository.
        depot_cmd(&config_path, &["list"])
            .assert()
            .success()
            .stdout(contains(url.as_str()));

        let output = temp.path().join("out/widget.tar");
        depot_cmd(&config_path, &["pull", &url, "linux-amd64-widget:latest"])
            .arg("--output")
            .arg(&output)
            .assert()
            .success()
            .stdout(contains("Verified linux-amd64-widget:latest"));
        assert_eq!(fs::read(&output).unwrap(), b"widget bundle");
        assert!(temp.path().join("cache").exists());

        depot_cmd(&config_path, &["pull", &url, "missing"])
            .assert()
            .failure()
            .stderr(contains("not in the manifest"));

        depot_cmd(&config_path, &["delete", &url, "linux-amd64-widget:latest"])
            .assert()
            .success();
        depot_cmd(&config_path, &["sync", &url])
            .assert()
            .success()
            .stdout(contains("0 artifacts"));
    })
    .await
    .unwrap();
}
