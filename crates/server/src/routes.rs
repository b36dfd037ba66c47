//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use tower_http::trace::TraceLayer;

/// Base path of one repository.
const REPO: &str = "/app/v1/{namespace}/{repository}";

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let repo_routes = Router::new()
        .route(REPO, get(handlers::list_artifacts))
        .route(&format!("{REPO}/pubkey"), get(handlers::get_public_key))
        .route(&format!("{REPO}/meta"), get(handlers::get_meta))
        .route(&format!("{REPO}/metasign"), get(handlers::get_meta_signature))
        .route(&format!("{REPO}/blob/{{name}}"), get(handlers::get_blob))
        .route(
            &format!("{REPO}/{{name}}"),
            put(handlers::put_artifact).delete(handlers::delete_artifact),
        )
        // Appliance bundles exceed the 2 MiB default.
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .route("/v1/health", get(handlers::health_check))
        .merge(repo_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
