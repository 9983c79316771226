//! Test utilities: RSA keypair, JWT factory, mock identity provider,
//! test app builder.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use edge_auth_gateway::cognito::jwt::JwksCache;
use edge_auth_gateway::cognito::params::IdpConfigCache;
use edge_auth_gateway::config::{Config, IdpConfig};
use edge_auth_gateway::{AppState, create_app};
use rsa::RsaPrivateKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REGION: &str = "ap-northeast-1";
pub const POOL_ID: &str = "ap-northeast-1_TestPool";
pub const CLIENT_ID: &str = "test-client-id";
pub const PROVIDER: &str = "CognitoIdentityServiceProvider";

/// Shared signing key; RSA generation is slow.
pub static KEYS: LazyLock<TestKeys> = LazyLock::new(TestKeys::generate);

/// Test RSA keypair for signing JWTs.
pub struct TestKeys {
    pub private_key: RsaPrivateKey,
    pub kid: String,
}

impl TestKeys {
    pub fn generate() -> Self {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate key");
        Self {
            private_key,
            kid: "test-key-1".into(),
        }
    }

    /// Build a signed JWT with the given claims.
    pub fn sign_jwt(&self, claims: &serde_json::Value) -> String {
        self.sign_jwt_with_kid(claims, &self.kid)
    }

    pub fn sign_jwt_with_kid(&self, claims: &serde_json::Value, kid: &str) -> String {
        // ring expects a bare PKCS#1 RSAPrivateKey.
        let der = self
            .private_key
            .to_pkcs1_der()
            .expect("failed to encode private key");
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_der(der.as_bytes());

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some(kid.to_string());

        jsonwebtoken::encode(&header, claims, &encoding_key).expect("failed to sign JWT")
    }

    /// Build JWKS JSON response for wiremock.
    pub fn jwks_json(&self) -> serde_json::Value {
        let public_key = self.private_key.to_public_key();
        let der = public_key
            .to_pkcs1_der()
            .expect("failed to encode public key");

        let (n, e) = parse_rsa_public_key_der(der.as_bytes());

        json!({
            "keys": [{
                "kid": self.kid,
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": URL_SAFE_NO_PAD.encode(&n),
                "e": URL_SAFE_NO_PAD.encode(&e)
            }]
        })
    }
}

/// Parse RSA public key DER to get (n, e) byte vectors.
fn parse_rsa_public_key_der(der: &[u8]) -> (Vec<u8>, Vec<u8>) {
    // PKCS#1 RSAPublicKey is: SEQUENCE { n INTEGER, e INTEGER }
    let mut pos = 0;

    assert_eq!(der[pos], 0x30);
    pos += 1;
    let (_seq_len, consumed) = parse_der_length(&der[pos..]);
    pos += consumed;

    assert_eq!(der[pos], 0x02);
    pos += 1;
    let (n_len, consumed) = parse_der_length(&der[pos..]);
    pos += consumed;
    let mut n = der[pos..pos + n_len].to_vec();
    // Strip the sign byte.
    if !n.is_empty() && n[0] == 0x00 {
        n.remove(0);
    }
    pos += n_len;

    assert_eq!(der[pos], 0x02);
    pos += 1;
    let (e_len, consumed) = parse_der_length(&der[pos..]);
    pos += consumed;
    let e = der[pos..pos + e_len].to_vec();

    (n, e)
}

fn parse_der_length(data: &[u8]) -> (usize, usize) {
    if data[0] < 0x80 {
        (data[0] as usize, 1)
    } else {
        let num_bytes = (data[0] & 0x7f) as usize;
        let mut len = 0usize;
        for i in 0..num_bytes {
            len = (len << 8) | (data[1 + i] as usize);
        }
        (len, 1 + num_bytes)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Access-token claims for `username`, expiring `ttl_secs` from now
/// (negative for an already expired token).
pub fn access_claims(issuer: &str, username: &str, ttl_secs: i64) -> serde_json::Value {
    let exp = now_secs().saturating_add_signed(ttl_secs);
    json!({
        "sub": format!("sub-{username}"),
        "username": username,
        "iss": issuer,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "openid email profile",
        "exp": exp,
        "iat": exp.saturating_sub(3600),
    })
}

/// ID-token claims for `username`.
pub fn id_claims(issuer: &str, username: &str, ttl_secs: i64) -> serde_json::Value {
    let exp = now_secs().saturating_add_signed(ttl_secs);
    json!({
        "sub": format!("sub-{username}"),
        "cognito:username": username,
        "email": format!("{username}@example.com"),
        "iss": issuer,
        "aud": CLIENT_ID,
        "token_use": "id",
        "exp": exp,
        "iat": exp.saturating_sub(3600),
    })
}

/// Wiremock stand-in for the Cognito IDP, JWKS and hosted-UI endpoints.
pub struct MockIdp {
    pub server: MockServer,
    pub idp: IdpConfig,
}

impl MockIdp {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let idp = IdpConfig::new(REGION, POOL_ID, CLIENT_ID, server.uri())
            .with_idp_endpoint(server.uri());
        Self { server, idp }
    }

    pub fn issuer(&self) -> String {
        self.idp.issuer()
    }

    /// Serve the JWKS, expecting `calls` fetches when given.
    pub async fn mount_jwks(&self, calls: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/{POOL_ID}/.well-known/jwks.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(KEYS.jwks_json()));
        match calls {
            Some(n) => mock.expect(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    /// Token endpoint answer for the given grant type.
    pub async fn mount_token(&self, grant_type: &str, status: u16, body: serde_json::Value, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains(format!("grant_type={grant_type}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Fresh signed (id, access) pair for `username`.
    pub fn tokens_for(&self, username: &str) -> (String, String) {
        let issuer = self.issuer();
        (
            KEYS.sign_jwt(&id_claims(&issuer, username, 3600)),
            KEYS.sign_jwt(&access_claims(&issuer, username, 3600)),
        )
    }
}

/// `Cookie` header carrying a full session for `username`.
pub fn session_cookie_header(
    username: &str,
    id_token: &str,
    access_token: &str,
    refresh_token: Option<&str>,
) -> String {
    let mut parts = vec![
        format!("{PROVIDER}.{CLIENT_ID}.LastAuthUser={username}"),
        format!("{PROVIDER}.{CLIENT_ID}.{username}.idToken={id_token}"),
        format!("{PROVIDER}.{CLIENT_ID}.{username}.accessToken={access_token}"),
    ];
    if let Some(rt) = refresh_token {
        parts.push(format!("{PROVIDER}.{CLIENT_ID}.{username}.refreshToken={rt}"));
    }
    parts.join("; ")
}

/// Test app over a preloaded identity-provider config.
///
/// The returned `TempDir` is the static origin and must outlive the app.
pub fn build_test_app(idp: IdpConfig) -> (axum::Router, Arc<AppState>, TempDir) {
    build_test_app_with(Config::test_default(), IdpConfigCache::preloaded(idp))
}

/// Test app with a custom Config and identity-provider cache.
pub fn build_test_app_with(
    mut config: Config,
    idp: IdpConfigCache,
) -> (axum::Router, Arc<AppState>, TempDir) {
    let static_dir = tempfile::tempdir().expect("failed to create static dir");
    std::fs::write(static_dir.path().join("index.html"), "<h1>protected app</h1>")
        .expect("failed to write index.html");
    std::fs::write(static_dir.path().join("landing"), "<h1>landing</h1>")
        .expect("failed to write landing page");
    config.static_dir = static_dir.path().to_string_lossy().into_owned();

    let http_client = reqwest::Client::new();
    let jwks_cache = Arc::new(JwksCache::new(http_client.clone()));
    let state = Arc::new(AppState {
        config,
        http_client,
        idp,
        jwks_cache,
    });

    let app = create_app(state.clone());
    (app, state, static_dir)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .header("host", "d111111abcdef8.cloudfront.net")
        .header("x-forwarded-proto", "https");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Helper to read response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the cookie `name` among `Set-Cookie` headers.
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        c.split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&format!("{name}=")))
            .map(String::from)
    })
}

/// Split a `Cookie` header into name → value.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
