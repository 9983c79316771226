//! Gateway configuration.
//!
//! Two layers: `Config` holds static process settings read from the
//! environment at start-up, `IdpConfig` holds the four identity-provider
//! values resolved from the configuration source on the first request.

use std::env;

/// Static gateway settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `ssm` or `env`.
    pub parameter_source: String,
    pub ssm_region: String,
    pub parameter_prefix: String,
    /// Overrides the Cognito IDP endpoint (local emulators, tests).
    pub idp_endpoint: Option<String>,
    pub callback_path: String,
    pub callback_url: Option<String>,
    pub logout_path: String,
    pub logout_uri: Option<String>,
    pub landing_paths: Vec<String>,
    pub oauth_scopes: Vec<String>,
    pub cookie_expiration_days: u32,
    pub cookie_secure: bool,
    pub api_path_prefix: String,
    pub static_dir: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Nothing is strictly required here: the identity-provider values
    /// come from the parameter source, not from this struct.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cookie_expiration_days = match env::var("COOKIE_EXPIRATION_DAYS") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("COOKIE_EXPIRATION_DAYS".into(), v))?,
            Err(_) => 1,
        };

        let parameter_source = env::var("PARAMETER_SOURCE").unwrap_or_else(|_| "ssm".into());
        if parameter_source != "ssm" && parameter_source != "env" {
            return Err(ConfigError::Invalid(
                "PARAMETER_SOURCE".into(),
                parameter_source,
            ));
        }

        Ok(Self {
            parameter_source,
            ssm_region: env::var("SSM_REGION").unwrap_or_else(|_| "ap-northeast-1".into()),
            parameter_prefix: env::var("PARAMETER_PREFIX")
                .unwrap_or_else(|_| "/sample-edge-auth".into()),
            idp_endpoint: optional_env("COGNITO_IDP_ENDPOINT"),
            callback_path: env::var("CALLBACK_PATH").unwrap_or_else(|_| "/".into()),
            callback_url: optional_env("CALLBACK_URL"),
            logout_path: env::var("LOGOUT_PATH").unwrap_or_else(|_| "/logout".into()),
            logout_uri: optional_env("LOGOUT_URI"),
            landing_paths: split_list(
                &env::var("LANDING_PATHS").unwrap_or_else(|_| "/landing".into()),
                ',',
            ),
            oauth_scopes: split_list(
                &env::var("OAUTH_SCOPES").unwrap_or_else(|_| "openid email profile".into()),
                ' ',
            ),
            cookie_expiration_days,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            api_path_prefix: env::var("API_PATH_PREFIX").unwrap_or_else(|_| "/api".into()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "./dist".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
        })
    }

    /// Max-Age of the session cookies.
    pub fn cookie_max_age(&self) -> u64 {
        u64::from(self.cookie_expiration_days) * 86_400
    }

    pub fn is_landing_path(&self, path: &str) -> bool {
        self.landing_paths.iter().any(|p| p == path)
    }
}

/// Configuration for testing — all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            parameter_source: "env".into(),
            ssm_region: "ap-northeast-1".into(),
            parameter_prefix: "/sample-edge-auth".into(),
            idp_endpoint: None,
            callback_path: "/".into(),
            callback_url: Some("https://d111111abcdef8.cloudfront.net/".into()),
            logout_path: "/logout".into(),
            logout_uri: None,
            landing_paths: vec!["/landing".into()],
            oauth_scopes: vec!["openid".into(), "email".into(), "profile".into()],
            cookie_expiration_days: 1,
            cookie_secure: false,
            api_path_prefix: "/api".into(),
            static_dir: "./dist".into(),
            port: 3001,
        }
    }
}

/// Identity-provider settings for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub hosted_domain: String,
    pub idp_endpoint: String,
}

impl IdpConfig {
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        hosted_domain: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            idp_endpoint: format!("https://cognito-idp.{region}.amazonaws.com"),
            region,
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            hosted_domain: hosted_domain.into(),
        }
    }

    /// Build from a pool id alone, deriving the region from its
    /// `<region>_<suffix>` form. Used by the standalone API authorizer,
    /// which never talks to the hosted login domain.
    pub fn from_user_pool(user_pool_id: &str, client_id: &str) -> Option<Self> {
        let (region, suffix) = user_pool_id.split_once('_')?;
        if region.is_empty() || suffix.is_empty() {
            return None;
        }
        Some(Self::new(region, user_pool_id, client_id, String::new()))
    }

    pub fn with_idp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.idp_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Cognito OIDC issuer URL.
    pub fn issuer(&self) -> String {
        format!("{}/{}", self.idp_endpoint, self.user_pool_id)
    }

    /// JWKS endpoint URL.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer())
    }

    /// Hosted UI base URL; a bare domain is served over https.
    pub fn hosted_base_url(&self) -> String {
        let domain = self.hosted_domain.trim_end_matches('/');
        if domain.starts_with("https://") || domain.starts_with("http://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    /// OAuth2 token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.hosted_base_url())
    }

    /// Hosted login URL with the authorization-code parameters.
    pub fn login_url(
        &self,
        scopes: &[String],
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> String {
        let scope = scopes
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        format!(
            "{}/login?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}&code_challenge_method=S256&code_challenge={}",
            self.hosted_base_url(),
            urlencoding::encode(&self.client_id),
            scope,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    /// Hosted logout URL that returns the browser to `logout_uri`.
    pub fn logout_url(&self, logout_uri: &str) -> String {
        format!(
            "{}/logout?client_id={}&logout_uri={}",
            self.hosted_base_url(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(logout_uri),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    Invalid(String, String),
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
