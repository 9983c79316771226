//! GET {api} and {api}/ping: local stand-in for the API origin.
//!
//! Reports whether the request carries a non-empty `accessToken` cookie.

use axum::Json;
use axum::http::{HeaderMap, StatusCode, header};
use serde_json::json;

use crate::authorizer::AuthorizerContext;
use crate::session::cookie::parse_header_values;
use crate::types::ProbeResponse;

const PROBE_COOKIE: &str = "accessToken";

pub async fn ping(caller: AuthorizerContext, headers: HeaderMap) -> (StatusCode, Json<ProbeResponse>) {
    let ok = parse_header_values(headers.get_all(header::COOKIE))
        .get(PROBE_COOKIE)
        .is_some_and(|v| !v.is_empty());

    tracing::debug!(username = %caller.username, ok, "Backend probe");
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ProbeResponse { ok }))
}

/// Any other path under the API prefix, after authorization.
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})))
}
