//! Stateless API authorizer.
//!
//! Guards the API path with the access-token cookie alone. It never
//! writes cookies, never redirects and never calls the token endpoint;
//! the only network traffic is the JWKS fetch behind [`JwksCache`].

pub mod middleware;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cognito::jwt::{JwksCache, TokenUse, VerificationError, verify_token};
use crate::config::IdpConfig;
use crate::ocsf;
use crate::session::cookie::{CookieMap, CookieSource, find_access_token, parse_header, parse_list};

/// HTTP API v2 request-authorizer event (the fields used here).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub raw_path: String,
    #[serde(default)]
    pub cookies: Option<Vec<String>>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl CookieSource for AuthorizerRequest {
    /// The `cookies` array wins when non-empty, otherwise the `Cookie`
    /// header is parsed.
    fn cookies(&self) -> CookieMap {
        if let Some(list) = self.cookies.as_ref().filter(|l| !l.is_empty()) {
            return parse_list(list);
        }
        self.headers
            .get("cookie")
            .or_else(|| self.headers.get("Cookie"))
            .map(|h| parse_header(h))
            .unwrap_or_default()
    }
}

/// Caller-visible context attached to a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizerContext {
    pub sub: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub is_authorized: bool,
    pub context: AuthorizerContext,
}

impl AuthorizerResponse {
    pub fn deny() -> Self {
        Self {
            is_authorized: false,
            context: AuthorizerContext::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DenyReason {
    #[error("access token cookie not found")]
    NoToken,
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl DenyReason {
    fn kind(&self) -> &'static str {
        match self {
            DenyReason::NoToken => "no_token",
            DenyReason::Verification(e) => e.kind(),
        }
    }
}

/// Decide whether `req` carries a valid access token.
///
/// Any failure yields a deny with an empty context; the reason only
/// goes to the log.
pub async fn authorize<R: CookieSource>(
    req: &R,
    path: &str,
    idp: &IdpConfig,
    jwks: &JwksCache,
) -> AuthorizerResponse {
    match check(req, idp, jwks).await {
        Ok(context) => {
            tracing::debug!(path, sub = %context.sub, "API request authorized");
            ocsf::authorization_event(path, true, Some(&context.username), "verified");
            AuthorizerResponse {
                is_authorized: true,
                context,
            }
        }
        Err(reason) => {
            tracing::info!(path, reason = reason.kind(), error = %reason, "API request denied");
            ocsf::authorization_event(path, false, None, reason.kind());
            AuthorizerResponse::deny()
        }
    }
}

async fn check<R: CookieSource>(
    req: &R,
    idp: &IdpConfig,
    jwks: &JwksCache,
) -> Result<AuthorizerContext, DenyReason> {
    let cookies = req.cookies();
    let token = find_access_token(&cookies, &idp.client_id).ok_or(DenyReason::NoToken)?;
    let claims = verify_token(token, TokenUse::Access, idp, jwks).await?;
    Ok(AuthorizerContext {
        username: claims.username().unwrap_or_default().to_string(),
        sub: claims.sub,
    })
}
