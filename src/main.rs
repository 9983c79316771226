//! Dual-mode entrypoint: Lambda or local dev server.
//!
//! Detects Lambda runtime via `AWS_LAMBDA_RUNTIME_API` env var.
//! - Lambda: `lambda_http::run(app)`
//! - Local: `axum::serve(listener, app)`, serving `STATIC_DIR` as the origin

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

use edge_auth_gateway::cognito::jwt::JwksCache;
use edge_auth_gateway::cognito::params::{
    AnySource, IdpConfigCache, ParameterNames, SsmParameterSource, StaticParameterSource,
};
use edge_auth_gateway::config::Config;
use edge_auth_gateway::{AppState, create_app};

#[tokio::main]
async fn main() {
    let is_lambda = env::var("AWS_LAMBDA_RUNTIME_API").is_ok();

    // Init tracing: JSON for Lambda, pretty for local
    if is_lambda {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        // Load .env for local dev
        let _ = dotenvy::dotenv();
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client");
    let jwks_cache = Arc::new(JwksCache::new(http_client.clone()));

    // Parameters are fetched lazily on the first request, not here.
    let names = ParameterNames::from_prefix(&config.parameter_prefix);
    let source = if config.parameter_source == "ssm" {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.ssm_region.clone()))
            .load()
            .await;
        tracing::info!(
            region = %config.ssm_region,
            prefix = %config.parameter_prefix,
            "Using SSM parameter source"
        );
        AnySource::Ssm(SsmParameterSource::new(aws_sdk_ssm::Client::new(&sdk_config)))
    } else {
        tracing::info!("Using environment parameter source");
        AnySource::Static(StaticParameterSource::from_env(&names))
    };
    let idp = IdpConfigCache::new(source, names, config.idp_endpoint.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        http_client,
        idp,
        jwks_cache,
    });

    let app = create_app(state);

    if is_lambda {
        tracing::info!("Starting in Lambda mode");
        lambda_http::run(app).await.expect("Lambda runtime error");
    } else {
        let addr = format!("0.0.0.0:{}", config.port);
        tracing::info!(static_dir = %config.static_dir, "Starting local server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind");
        axum::serve(listener, app).await.expect("Server error");
    }
}
