use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::{EdgeAction, ViewerRequest, intercept};
use crate::AppState;

/// Axum middleware running the edge interceptor in front of every
/// protected route.
pub async fn edge_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let default_scheme = if state.config.cookie_secure {
        "https"
    } else {
        "http"
    };
    let viewer = ViewerRequest::from_parts(request.uri(), request.headers(), default_scheme);
    let decision = intercept(&state, &viewer).await;
    tracing::debug!(state = ?decision.state, path = viewer.path(), "Edge decision");

    match decision.action {
        EdgeAction::Respond(response) => response.into_response(),
        EdgeAction::Forward {
            set_cookies,
            cookie_header,
        } => {
            if let Some(value) = cookie_header.and_then(|h| HeaderValue::from_str(&h).ok()) {
                let headers = request.headers_mut();
                headers.remove(header::COOKIE);
                headers.insert(header::COOKIE, value);
            }

            let mut response = next.run(request).await;
            for cookie in set_cookies {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
            response
        }
    }
}
