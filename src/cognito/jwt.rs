//! JWT decode, verify, and JWKS cache.
//!
//! `verify_token` is the only path that trusts a token presented by a
//! browser. `decode_jwt_unverified` is reserved for tokens the gateway just
//! received from the token endpoint over TLS.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::config::IdpConfig;

/// Minimum spacing between two key-set fetches triggered by unknown kids.
const REFETCH_COOLDOWN: Duration = Duration::from_secs(10);

/// Claims carried by Cognito ID and access tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    /// Access tokens carry `username`, ID tokens `cognito:username`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "cognito:username", default)]
    pub cognito_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub token_use: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    pub cognito_groups: Vec<String>,
}

impl Claims {
    /// Username, whichever claim carries it.
    pub fn username(&self) -> Option<&str> {
        self.cognito_username
            .as_deref()
            .or(self.username.as_deref())
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Which kind of token a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Access,
    Id,
}

impl TokenUse {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

/// JWKS key entry from Cognito's /.well-known/jwks.json
#[derive(Debug, Clone, Deserialize)]
pub struct JwkKey {
    pub kid: String,
    pub kty: String,
    pub n: String,
    pub e: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
}

/// JWKS response from Cognito.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwkKey>,
}

#[derive(Default)]
struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

/// Key set cached for the life of the process.
///
/// A lookup miss triggers one refetch; misses within `REFETCH_COOLDOWN`
/// of the previous fetch are answered from the cache.
pub struct JwksCache {
    keys: RwLock<KeySet>,
    http_client: reqwest::Client,
    fetches: AtomicUsize,
}

impl JwksCache {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            keys: RwLock::new(KeySet::default()),
            http_client,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Resolve the decoding key for `kid`, fetching the key set on a miss.
    pub async fn key(&self, jwks_url: &str, kid: &str) -> Result<DecodingKey, VerificationError> {
        {
            let guard = self.keys.read().await;
            if let Some(key) = guard.keys.get(kid) {
                return Ok(key.clone());
            }
            if guard
                .fetched_at
                .is_some_and(|at| at.elapsed() < REFETCH_COOLDOWN)
            {
                return Err(VerificationError::UnknownKey(kid.into()));
            }
        }

        if let Err(e) = self.refresh(jwks_url).await {
            tracing::warn!(error = %e, "JWKS fetch failed");
        }

        self.keys
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| VerificationError::UnknownKey(kid.into()))
    }

    /// Fetch the key set and replace the cached keys.
    pub async fn refresh(&self, jwks_url: &str) -> Result<(), JwksFetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let resp = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| JwksFetchError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JwksFetchError(format!("HTTP {}", resp.status())));
        }

        let jwks: JwksResponse = resp
            .json()
            .await
            .map_err(|e| JwksFetchError(e.to_string()))?;

        let mut key_map = HashMap::new();
        for key in jwks.keys.iter().filter(|k| k.kty == "RSA") {
            if let Ok(dk) = DecodingKey::from_rsa_components(&key.n, &key.e) {
                key_map.insert(key.kid.clone(), dk);
            }
        }

        let mut guard = self.keys.write().await;
        guard.keys = key_map;
        guard.fetched_at = Some(Instant::now());
        Ok(())
    }

    /// Number of key-set fetches attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

/// Decode a JWT payload without signature verification (for reading claims).
pub fn decode_jwt_unverified(token: &str) -> Result<Claims, VerificationError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(VerificationError::Malformed("expected three segments".into()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| VerificationError::Malformed("payload is not base64url".into()))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| VerificationError::Malformed(format!("payload: {e}")))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Verify a Cognito token end to end.
///
/// Order: structure, key lookup, RS256 signature, then claims
/// (`iss`, `token_use`, client, `exp`).
pub async fn verify_token(
    token: &str,
    expected: TokenUse,
    idp: &IdpConfig,
    jwks_cache: &JwksCache,
) -> Result<Claims, VerificationError> {
    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| VerificationError::Malformed(format!("header: {e}")))?;
    decode_jwt_unverified(token)?;
    let kid = header
        .kid
        .ok_or_else(|| VerificationError::Malformed("token missing kid header".into()))?;

    let decoding_key = jwks_cache.key(&idp.jwks_url(), &kid).await?;

    // Signature only; claims are checked below so each failure is named.
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    // Header and payload already decoded above, so a base64 failure here
    // can only come from the signature segment.
    let claims = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::Json(_) | ErrorKind::Utf8(_) => VerificationError::Malformed(e.to_string()),
            _ => VerificationError::BadSignature,
        })?
        .claims;

    check_claims(&claims, expected, idp, now_secs())?;
    Ok(claims)
}

fn check_claims(
    claims: &Claims,
    expected: TokenUse,
    idp: &IdpConfig,
    now: u64,
) -> Result<(), VerificationError> {
    if claims.iss.as_deref() != Some(idp.issuer().as_str()) {
        return Err(VerificationError::ClaimRejected { claim: "iss" });
    }
    if claims.token_use.as_deref() != Some(expected.as_str()) {
        return Err(VerificationError::ClaimRejected { claim: "token_use" });
    }
    let (claim, value) = match expected {
        TokenUse::Access => ("client_id", claims.client_id.as_deref()),
        TokenUse::Id => ("aud", claims.aud.as_deref()),
    };
    if value != Some(idp.client_id.as_str()) {
        return Err(VerificationError::ClaimRejected { claim });
    }
    if claims.exp.is_none_or(|exp| now >= exp) {
        return Err(VerificationError::ClaimRejected { claim: "exp" });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
#[error("JWKS fetch failed: {0}")]
pub struct JwksFetchError(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signing key not found for kid: {0}")]
    UnknownKey(String),

    #[error("token signature is invalid")]
    BadSignature,

    #[error("claim rejected: {claim}")]
    ClaimRejected { claim: &'static str },
}

impl VerificationError {
    /// Stable name of the failure kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::Malformed(_) => "malformed",
            VerificationError::UnknownKey(_) => "unknown_key",
            VerificationError::BadSignature => "bad_signature",
            VerificationError::ClaimRejected { .. } => "claim_rejected",
        }
    }
}
