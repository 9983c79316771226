//! Shared response DTOs for the gateway's own routes.

use serde::Serialize;

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// `ready` once the identity-provider settings are cached, else `pending`.
    pub idp: String,
}

/// GET {api}/ping response.
#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub ok: bool,
}
