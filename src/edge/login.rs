//! Login redirect: PKCE, CSRF state, and the hosted-login URL.
//!
//! The state value sent to the provider is `<nonce>.<base64url(target)>`,
//! where `target` is the path and query the browser originally asked for.
//! The same value is stored in a short-lived cookie and compared on the
//! callback.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{EdgeResponse, ViewerRequest};
use crate::config::{Config, IdpConfig};
use crate::session::cookie::{CookieOptions, build_set_cookie};

/// Lifetime of the state and PKCE cookies.
pub const AUTH_FLOW_MAX_AGE_SECS: u64 = 300;

pub fn state_cookie(client_id: &str) -> String {
    format!("EdgeAuth.{client_id}.state")
}

pub fn pkce_cookie(client_id: &str) -> String {
    format!("EdgeAuth.{client_id}.pkce")
}

pub fn flow_cookie_options(config: &Config) -> CookieOptions {
    CookieOptions::http_only_lax(AUTH_FLOW_MAX_AGE_SECS, config.cookie_secure)
}

/// Redirect URI registered with the provider.
pub fn redirect_uri(config: &Config, req: &ViewerRequest) -> String {
    config
        .callback_url
        .clone()
        .unwrap_or_else(|| format!("{}{}", req.origin, config.callback_path))
}

/// 32 random bytes, base64url without padding.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE pair (RFC 7636, S256).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        Self::from_verifier(random_token())
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn encode_state(nonce: &str, target: &str) -> String {
    format!("{nonce}.{}", URL_SAFE_NO_PAD.encode(target.as_bytes()))
}

/// Where to send the browser after a successful callback.
///
/// Only same-origin relative paths survive; anything else becomes `/`.
pub fn return_target(state: &str) -> String {
    state
        .split_once('.')
        .and_then(|(_, encoded)| URL_SAFE_NO_PAD.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|target| is_local_path(target))
        .unwrap_or_else(|| "/".into())
}

fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// 302 to the hosted login page, setting the state and PKCE cookies.
pub fn begin_login(config: &Config, idp: &IdpConfig, req: &ViewerRequest) -> EdgeResponse {
    let pkce = Pkce::generate();
    let state = encode_state(&random_token(), req.path_and_query());
    let location = idp.login_url(
        &config.oauth_scopes,
        &redirect_uri(config, req),
        &state,
        &pkce.challenge,
    );

    let opts = flow_cookie_options(config);
    let set_cookies = vec![
        build_set_cookie(&state_cookie(&idp.client_id), &state, &opts),
        build_set_cookie(&pkce_cookie(&idp.client_id), &pkce.verifier, &opts),
    ];
    tracing::debug!(path = req.path(), "Redirecting to hosted login");
    EdgeResponse::redirect(location, set_cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn viewer(path: &str) -> ViewerRequest {
        ViewerRequest {
            uri: path.parse().unwrap(),
            cookie_header: None,
            origin: "https://d111111abcdef8.cloudfront.net".into(),
        }
    }

    fn idp() -> IdpConfig {
        IdpConfig::new("ap-northeast-1", "ap-northeast-1_ABC", "client1", "auth.example.com")
    }

    #[test]
    fn test_pkce_rfc7636_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_generated_values_are_unique() {
        let a = Pkce::generate();
        let b = Pkce::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_eq!(a.verifier.len(), 43);
        assert_ne!(random_token(), random_token());
    }

    #[test]
    fn test_state_round_trips_target() {
        let state = encode_state("nonce", "/docs/a?x=1");
        assert_eq!(return_target(&state), "/docs/a?x=1");
    }

    #[test]
    fn test_return_target_rejects_offsite() {
        assert_eq!(return_target(&encode_state("n", "//evil.example")), "/");
        assert_eq!(return_target(&encode_state("n", "https://evil.example")), "/");
        assert_eq!(return_target(&encode_state("n", "/\\evil.example")), "/");
        assert_eq!(return_target("no-dot"), "/");
        assert_eq!(return_target("n.!!!"), "/");
    }

    #[test]
    fn test_redirect_uri_prefers_configured_url() {
        let mut config = Config::test_default();
        assert_eq!(
            redirect_uri(&config, &viewer("/x")),
            "https://d111111abcdef8.cloudfront.net/"
        );
        config.callback_url = None;
        config.callback_path = "/oauth2/idpresponse".into();
        assert_eq!(
            redirect_uri(&config, &viewer("/x")),
            "https://d111111abcdef8.cloudfront.net/oauth2/idpresponse"
        );
    }

    #[test]
    fn test_begin_login() {
        let config = Config::test_default();
        let resp = begin_login(&config, &idp(), &viewer("/reports?q=1"));

        assert_eq!(resp.status, StatusCode::FOUND);
        let location = resp.location.unwrap();
        assert!(location.starts_with("https://auth.example.com/login?client_id=client1"));
        assert!(location.contains("code_challenge_method=S256"));
        assert!(location.contains(&format!(
            "redirect_uri={}",
            urlencoding::encode("https://d111111abcdef8.cloudfront.net/")
        )));

        assert_eq!(resp.set_cookies.len(), 2);
        let state_value = resp.set_cookies[0]
            .strip_prefix("EdgeAuth.client1.state=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert_eq!(return_target(state_value), "/reports?q=1");
        assert!(location.contains(&format!("state={}", urlencoding::encode(state_value))));
        assert!(resp.set_cookies[1].starts_with("EdgeAuth.client1.pkce="));
        assert!(resp.set_cookies[1].contains("Max-Age=300"));
    }
}
