//! Edge authentication gateway.
//!
//! An OAuth2/OIDC authorization-code session enforced in front of a static
//! site, plus a stateless cookie-based authorizer for the API path. The
//! same Axum router runs in both Lambda and local dev contexts; detection
//! is via the `AWS_LAMBDA_RUNTIME_API` env var.

pub mod authorizer;
pub mod cognito;
pub mod config;
pub mod edge;
pub mod error;
pub mod ocsf;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::cognito::jwt::JwksCache;
use crate::cognito::params::IdpConfigCache;
use crate::config::Config;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub idp: IdpConfigCache,
    pub jwks_cache: Arc<JwksCache>,
}

/// Build the Axum router with all middleware and routes.
///
/// Everything outside the API prefix and `/health` goes through the edge
/// interceptor before reaching the static origin. Unknown paths serve
/// `index.html` so client-side routing works. Every path under the API
/// prefix, known or not, sits behind the authorizer.
pub fn create_app(state: Arc<AppState>) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let static_origin =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let api_prefix = state.config.api_path_prefix.trim_end_matches('/').to_string();
    let mut api_routes = Router::new()
        .route(&format!("{api_prefix}/ping"), get(routes::ping::ping))
        .route(&format!("{api_prefix}/{{*rest}}"), any(routes::ping::not_found));
    if !api_prefix.is_empty() {
        api_routes = api_routes.route(&api_prefix, get(routes::ping::ping));
    }
    let api_routes = api_routes.route_layer(from_fn_with_state(
        state.clone(),
        authorizer::middleware::require_authorized,
    ));

    Router::new()
        .fallback_service(static_origin)
        .layer(from_fn_with_state(state.clone(), edge::middleware::edge_auth))
        .merge(api_routes)
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
