//! Cognito OAuth2 token endpoint client: code exchange and refresh.
//!
//! One attempt per call. Failures are returned to the caller, which
//! surfaces them on the current request only.

use serde::Deserialize;

use crate::config::IdpConfig;

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh unless the pool rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Exchange an OAuth authorization code for tokens.
///
/// POST to `{domain}/oauth2/token` with grant_type=authorization_code.
pub async fn exchange_code_for_tokens(
    http_client: &reqwest::Client,
    idp: &IdpConfig,
    code: &str,
    redirect_uri: &str,
    code_verifier: Option<&str>,
) -> Result<TokenSet, TokenExchangeError> {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("client_id", idp.client_id.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(verifier) = code_verifier {
        params.push(("code_verifier", verifier));
    }

    post_token_endpoint(http_client, idp, &params).await
}

/// Exchange a refresh token for a new ID/access token pair.
pub async fn refresh_tokens(
    http_client: &reqwest::Client,
    idp: &IdpConfig,
    refresh_token: &str,
) -> Result<TokenSet, TokenExchangeError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", idp.client_id.as_str()),
        ("refresh_token", refresh_token),
    ];

    post_token_endpoint(http_client, idp, &params).await
}

async fn post_token_endpoint(
    http_client: &reqwest::Client,
    idp: &IdpConfig,
    params: &[(&str, &str)],
) -> Result<TokenSet, TokenExchangeError> {
    let resp = http_client
        .post(idp.token_url())
        .form(params)
        .send()
        .await
        .map_err(|e| TokenExchangeError::Unreachable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TokenExchangeError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    resp.json()
        .await
        .map_err(|e| TokenExchangeError::InvalidResponse(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TokenExchangeError {
    #[error("token endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("token endpoint rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn idp_for(server: &MockServer) -> IdpConfig {
        IdpConfig::new("ap-northeast-1", "ap-northeast-1_pool", "test-client-id", server.uri())
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code-123"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-new",
                "id_token": "it-new",
                "refresh_token": "rt-new",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = exchange_code_for_tokens(
            &reqwest::Client::new(),
            &idp_for(&server),
            "auth-code-123",
            "https://d111.cloudfront.net/",
            Some("verifier-1"),
        )
        .await
        .unwrap();

        assert_eq!(tokens.access_token, "at-new");
        assert_eq!(tokens.id_token, "it-new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-new"));
        assert_eq!(tokens.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-refreshed",
                "id_token": "it-refreshed",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let tokens = refresh_tokens(&reqwest::Client::new(), &idp_for(&server), "rt-123")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "at-refreshed");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_rejected_carries_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let err = refresh_tokens(&reqwest::Client::new(), &idp_for(&server), "rt-revoked")
            .await
            .unwrap_err();
        match err {
            TokenExchangeError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_tokens_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "only"})),
            )
            .mount(&server)
            .await;

        let err = refresh_tokens(&reqwest::Client::new(), &idp_for(&server), "rt")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenExchangeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Nothing listens on the discard port.
        let idp = IdpConfig::new("r", "r_p", "c", "http://127.0.0.1:9");
        let err = refresh_tokens(&reqwest::Client::new(), &idp, "rt")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenExchangeError::Unreachable(_)));
    }
}
