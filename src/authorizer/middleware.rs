//! Axum adapter for the API authorizer.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use super::{AuthorizerContext, authorize};
use crate::AppState;
use crate::error::AppError;
use crate::session::cookie::{CookieMap, parse_header_values};

fn request_cookies(req: &Request) -> CookieMap {
    parse_header_values(req.headers().get_all(axum::http::header::COOKIE))
}

/// Middleware guarding the API routes. Allowed requests carry the
/// [`AuthorizerContext`] in their extensions.
pub async fn require_authorized(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let idp = state.idp.get_or_fetch().await?;
    let path = req.uri().path().to_string();

    let cookies = request_cookies(&req);

    let decision = authorize(&cookies, &path, &idp, &state.jwks_cache).await;
    if !decision.is_authorized {
        return Err(AppError::Forbidden);
    }

    req.extensions_mut().insert(decision.context);
    Ok(next.run(req).await)
}

/// Extract the authorizer context (put there by `require_authorized`).
impl<S> FromRequestParts<S> for AuthorizerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizerContext>()
            .cloned()
            .ok_or(AppError::Internal(
                "Authorizer middleware not configured".into(),
            ))
    }
}
