//! Edge interceptor: the per-request authentication state machine.
//!
//! No state is kept between requests. Each request is classified from its
//! path, query and cookies, and ends in exactly one of two actions: forward
//! to the origin (optionally with refreshed cookies) or answer directly
//! with a redirect or error.
//!
//! | Path            | Condition                       | Outcome                     |
//! |-----------------|---------------------------------|-----------------------------|
//! | landing         | any                             | forward untouched           |
//! | logout          | any                             | clear cookies, 302 to IdP   |
//! | callback        | `code`/`error` in query         | exchange, 302 or 400/502    |
//! | protected       | valid id + access tokens        | forward                     |
//! | protected       | invalid tokens, refresh cookie  | refresh, forward or 302     |
//! | protected       | otherwise                       | 302 to hosted login         |

pub mod callback;
pub mod login;
pub mod logout;
pub mod middleware;
pub mod refresh;

use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::cognito::jwt::{TokenUse, VerificationError, verify_token};
use crate::config::{Config, IdpConfig};
use crate::error::AppError;
use crate::session::SessionCookies;
use crate::session::cookie::{CookieMap, CookieOptions, CookieSource, header_pairs, parse_header};

/// Authentication state a request was handled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Redirecting,
    CallbackPending,
    Authenticated,
    Refreshing,
    LoggingOut,
}

/// A viewer request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct ViewerRequest {
    pub uri: Uri,
    pub cookie_header: Option<String>,
    /// `scheme://host` the browser addressed.
    pub origin: String,
}

impl ViewerRequest {
    /// Build from request parts. Host and scheme honour `X-Forwarded-*`.
    pub fn from_parts(uri: &Uri, headers: &HeaderMap, default_scheme: &str) -> Self {
        let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let host = header_str("x-forwarded-host")
            .or_else(|| header_str("host"))
            .or_else(|| uri.host())
            .unwrap_or("localhost");
        let scheme = header_str("x-forwarded-proto").unwrap_or(default_scheme);

        // HTTP/2 may split cookies over several headers.
        let cookies = header_pairs(headers.get_all(header::COOKIE));
        let cookie_header = (!cookies.is_empty()).then(|| cookies.join("; "));

        Self {
            uri: uri.clone(),
            cookie_header,
            origin: format!("{scheme}://{host}"),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

impl CookieSource for ViewerRequest {
    fn cookies(&self) -> CookieMap {
        self.cookie_header
            .as_deref()
            .map(parse_header)
            .unwrap_or_default()
    }
}

/// A response produced by the gateway instead of the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookies: Vec<String>,
    pub body: Option<serde_json::Value>,
}

impl EdgeResponse {
    pub fn redirect(location: String, set_cookies: Vec<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: Some(location),
            set_cookies,
            body: None,
        }
    }

    pub fn error(err: &AppError, set_cookies: Vec<String>) -> Self {
        let (status, body) = err.status_and_body();
        Self {
            status,
            location: None,
            set_cookies,
            body: Some(body),
        }
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        let mut resp = match self.body {
            Some(body) => (self.status, axum::Json(body)).into_response(),
            None => self.status.into_response(),
        };
        let headers = resp.headers_mut();
        if let Some(location) = self.location.and_then(|l| HeaderValue::from_str(&l).ok()) {
            headers.insert(header::LOCATION, location);
        }
        for cookie in self.set_cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(header::SET_COOKIE, value);
            }
        }
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        );
        resp
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EdgeAction {
    /// Continue to the origin. `cookie_header` replaces the request's
    /// `Cookie` header when tokens were refreshed.
    Forward {
        set_cookies: Vec<String>,
        cookie_header: Option<String>,
    },
    Respond(EdgeResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: AuthState,
    pub action: EdgeAction,
}

impl Decision {
    fn forward(state: AuthState) -> Self {
        Self {
            state,
            action: EdgeAction::Forward {
                set_cookies: Vec::new(),
                cookie_header: None,
            },
        }
    }

    fn respond(state: AuthState, response: EdgeResponse) -> Self {
        Self {
            state,
            action: EdgeAction::Respond(response),
        }
    }
}

/// Attributes of the three session cookies.
pub fn session_cookie_options(config: &Config) -> CookieOptions {
    CookieOptions::http_only_lax(config.cookie_max_age(), config.cookie_secure)
}

/// Decide what to do with one viewer request. Never fails: every
/// error is mapped to a response.
pub async fn intercept(state: &AppState, req: &ViewerRequest) -> Decision {
    let config = &state.config;

    if config.is_landing_path(req.path()) {
        return Decision::forward(AuthState::Unauthenticated);
    }

    let idp = match state.idp.get_or_fetch().await {
        Ok(idp) => idp,
        Err(e) => {
            tracing::error!(error = %e, "Identity provider configuration unavailable");
            let err = AppError::from(e);
            return Decision::respond(
                AuthState::Unauthenticated,
                EdgeResponse::error(&err, Vec::new()),
            );
        }
    };
    let cookies = req.cookies();

    if req.path() == config.logout_path {
        return Decision::respond(
            AuthState::LoggingOut,
            logout::logout(config, &idp, req, &cookies),
        );
    }

    if let Some(params) = callback::callback_params(config, req) {
        let response = callback::handle_callback(state, &idp, req, &cookies, params).await;
        return Decision::respond(AuthState::CallbackPending, response);
    }

    if let Some(session) = SessionCookies::from_cookies(&cookies, &idp.client_id) {
        match check_session(state, &idp, &session).await {
            Ok(()) => return Decision::forward(AuthState::Authenticated),
            Err(e) => tracing::debug!(
                kind = e.kind(),
                error = %e,
                username = %session.username,
                "Session tokens not accepted"
            ),
        }

        if let Some(refresh_token) = &session.refresh_token {
            match refresh::refresh_session(state, &idp, &session.username, refresh_token, &cookies)
                .await
            {
                Ok(refreshed) => {
                    return Decision {
                        state: AuthState::Refreshing,
                        action: EdgeAction::Forward {
                            set_cookies: refreshed.set_cookies,
                            cookie_header: Some(refreshed.cookie_header),
                        },
                    };
                }
                Err(e) => tracing::warn!(error = %e, "Token refresh failed, restarting login"),
            }
        }
    }

    Decision::respond(
        AuthState::Redirecting,
        login::begin_login(config, &idp, req),
    )
}

/// Both tokens must verify; a missing cookie counts as malformed.
async fn check_session(
    state: &AppState,
    idp: &IdpConfig,
    session: &SessionCookies,
) -> Result<(), VerificationError> {
    let access = session
        .access_token
        .as_deref()
        .ok_or_else(|| VerificationError::Malformed("access token cookie missing".into()))?;
    let id = session
        .id_token
        .as_deref()
        .ok_or_else(|| VerificationError::Malformed("id token cookie missing".into()))?;

    verify_token(access, TokenUse::Access, idp, &state.jwks_cache).await?;
    verify_token(id, TokenUse::Id, idp, &state.jwks_cache).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_request_prefers_forwarded_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("origin.internal"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("d111.cloudfront.net"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let uri: Uri = "/docs?page=2".parse().unwrap();

        let req = ViewerRequest::from_parts(&uri, &headers, "http");
        assert_eq!(req.origin, "https://d111.cloudfront.net");
        assert_eq!(req.path(), "/docs");
        assert_eq!(req.path_and_query(), "/docs?page=2");
        assert!(req.cookie_header.is_none());
        assert!(req.cookies().is_empty());
    }

    #[test]
    fn test_viewer_request_joins_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:3001"));
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        let uri: Uri = "/".parse().unwrap();

        let req = ViewerRequest::from_parts(&uri, &headers, "http");
        assert_eq!(req.origin, "http://localhost:3001");
        let cookies = req.cookies();
        assert_eq!(cookies.get("a"), Some("1"));
        assert_eq!(cookies.get("b"), Some("2"));
    }

    #[tokio::test]
    async fn test_edge_response_headers() {
        let resp = EdgeResponse::redirect(
            "https://login.example.com/login".into(),
            vec!["a=1; Path=/".into(), "b=2; Path=/".into()],
        )
        .into_response();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "https://login.example.com/login"
        );
        assert_eq!(resp.headers().get_all(header::SET_COOKIE).iter().count(), 2);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store"
        );
    }
}
