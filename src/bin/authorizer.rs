//! Standalone Lambda request authorizer for the API path.
//!
//! Receives the HTTP API v2 authorizer event and answers with the simple
//! `{isAuthorized, context}` response. The verifier and its key cache live
//! for the lifetime of the execution environment.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{Error, LambdaEvent, service_fn};
use tracing_subscriber::{EnvFilter, fmt};

use edge_auth_gateway::authorizer::{AuthorizerRequest, AuthorizerResponse, authorize};
use edge_auth_gateway::cognito::jwt::JwksCache;
use edge_auth_gateway::config::IdpConfig;

#[tokio::main]
async fn main() -> Result<(), Error> {
    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let user_pool_id = env::var("USER_POOL_ID").map_err(|_| "USER_POOL_ID is not set")?;
    let client_id = env::var("CLIENT_ID").map_err(|_| "CLIENT_ID is not set")?;
    let mut idp = IdpConfig::from_user_pool(&user_pool_id, &client_id)
        .ok_or("USER_POOL_ID must look like <region>_<id>")?;
    if let Ok(endpoint) = env::var("COGNITO_IDP_ENDPOINT") {
        idp = idp.with_idp_endpoint(endpoint);
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let idp = Arc::new(idp);
    let jwks = Arc::new(JwksCache::new(http_client));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<AuthorizerRequest>| {
        let idp = idp.clone();
        let jwks = jwks.clone();
        async move {
            let path = event.payload.raw_path.clone();
            tracing::info!(
                path = %path,
                has_cookies = event.payload.cookies.as_ref().is_some_and(|c| !c.is_empty()),
                "Authorizer invoked"
            );
            let response: AuthorizerResponse =
                authorize(&event.payload, &path, &idp, &jwks).await;
            Ok::<_, Error>(response)
        }
    }))
    .await
}
