//! OCSF (Open Cybersecurity Schema Framework) structured event logging.
//!
//! Events are emitted via `tracing::info!` on target `ocsf` as a single
//! JSON line. Never panics.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

// OCSF event class UIDs
pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_AUTH_TICKET: u32 = 3; // Authorization code exchange
pub const ACTIVITY_SERVICE_TICKET: u32 = 4; // Token refresh
pub const ACTIVITY_OTHER: u32 = 99; // API authorizer decisions

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;
pub const SEVERITY_HIGH: u32 = 4;

pub const AUTH_PROTOCOL_OAUTH2: u32 = 10;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        SEVERITY_HIGH => "High",
        _ => "Unknown",
    }
}

fn activity_name(id: u32) -> &'static str {
    match id {
        ACTIVITY_LOGOFF => "Logoff",
        ACTIVITY_AUTH_TICKET => "Authentication Ticket",
        ACTIVITY_SERVICE_TICKET => "Service Ticket",
        _ => "Other",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

fn base_event(activity_id: u32, status_id: u32, severity_id: u32, message: &str) -> serde_json::Value {
    json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity_id,
        "activity_name": activity_name(activity_id),
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": "edge-auth-gateway",
                "version": env!("CARGO_PKG_VERSION"),
            }
        },
        "auth_protocol_id": AUTH_PROTOCOL_OAUTH2,
        "auth_protocol": "OAuth 2.0/OIDC",
        "message": message,
    })
}

fn with_user(mut event: serde_json::Value, username: Option<&str>) -> serde_json::Value {
    if let Some(name) = username {
        event["actor"] = json!({
            "user": {
                "name": name,
                "type_id": 1,
                "type": "User"
            }
        });
    }
    event
}

/// Emit an OCSF event as structured JSON via tracing. Never panics.
fn emit(event: &serde_json::Value) {
    if let Ok(json) = serde_json::to_string(event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}

/// Build an OCSF Authentication (3001) event.
pub fn authentication_event_json(
    activity_id: u32,
    status_id: u32,
    severity_id: u32,
    username: Option<&str>,
    message: &str,
) -> serde_json::Value {
    with_user(base_event(activity_id, status_id, severity_id, message), username)
}

/// Emit an OCSF Authentication (3001) event.
pub fn authentication_event(
    activity_id: u32,
    status_id: u32,
    severity_id: u32,
    username: Option<&str>,
    message: &str,
) {
    emit(&authentication_event_json(
        activity_id,
        status_id,
        severity_id,
        username,
        message,
    ));
}

/// Emit an API authorizer decision (class 3001, activity 99/Other).
///
/// `reason` is the internal failure kind and only ever reaches the log.
pub fn authorization_event(path: &str, allowed: bool, username: Option<&str>, reason: &str) {
    let (status_id, severity_id, decision) = if allowed {
        (STATUS_SUCCESS, SEVERITY_INFORMATIONAL, "allow")
    } else {
        (STATUS_FAILURE, SEVERITY_LOW, "deny")
    };
    let mut event = base_event(
        ACTIVITY_OTHER,
        status_id,
        severity_id,
        &format!("API authorizer: {decision} for {path}"),
    );
    event["metadata"]["authorization"] = json!({
        "path": path,
        "decision": decision,
        "reason": reason,
    });
    emit(&with_user(event, username));
}
