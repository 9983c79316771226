//! Configuration source for the identity-provider settings.
//!
//! The four values (region, pool id, client id, hosted domain) live in SSM
//! Parameter Store. They are read once per process and held until the
//! process exits.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::IdpConfig;

/// Read-only key/value parameter store.
pub trait ParameterSource: Send + Sync {
    /// Fetch one parameter. A missing or empty value is an error.
    fn get_parameter(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, ConfigFetchError>> + Send;
}

/// SSM Parameter Store source.
pub struct SsmParameterSource {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterSource {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

impl ParameterSource for SsmParameterSource {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigFetchError> {
        let resp = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigFetchError::Unavailable {
                name: name.into(),
                reason: aws_sdk_ssm::error::DisplayErrorContext(&e).to_string(),
            })?;

        resp.parameter()
            .and_then(|p| p.value())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or_else(|| ConfigFetchError::Missing(name.into()))
    }
}

/// In-process source backed by a map. Used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticParameterSource {
    values: HashMap<String, String>,
}

impl StaticParameterSource {
    /// Map the parameter names onto the local-development env vars.
    pub fn from_env(names: &ParameterNames) -> Self {
        let pairs = [
            (&names.region, "COGNITO_REGION"),
            (&names.user_pool_id, "USER_POOL_ID"),
            (&names.client_id, "CLIENT_ID"),
            (&names.hosted_domain, "COGNITO_DOMAIN"),
        ];
        let values = pairs
            .into_iter()
            .filter_map(|(name, var)| std::env::var(var).ok().map(|v| (name.clone(), v)))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl ParameterSource for StaticParameterSource {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigFetchError> {
        self.values
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ConfigFetchError::Missing(name.into()))
    }
}

/// Source selected at start-up.
///
/// `ParameterSource` uses RPITIT and is not object-safe, so dispatch is
/// done by hand.
pub enum AnySource {
    Ssm(SsmParameterSource),
    Static(StaticParameterSource),
}

impl ParameterSource for AnySource {
    async fn get_parameter(&self, name: &str) -> Result<String, ConfigFetchError> {
        match self {
            AnySource::Ssm(s) => s.get_parameter(name).await,
            AnySource::Static(s) => s.get_parameter(name).await,
        }
    }
}

/// Parameter names for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterNames {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub hosted_domain: String,
}

impl ParameterNames {
    pub fn from_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            region: format!("{prefix}/cognito-region"),
            user_pool_id: format!("{prefix}/user-pool-id"),
            client_id: format!("{prefix}/user-pool-app-id"),
            hosted_domain: format!("{prefix}/user-pool-domain"),
        }
    }
}

/// Process-lifetime cache of the identity-provider settings.
///
/// Concurrent first requests may each fetch; the values are identical so
/// whichever finishes first is kept and the rest are dropped.
pub struct IdpConfigCache<S = AnySource> {
    source: S,
    names: ParameterNames,
    idp_endpoint: Option<String>,
    cached: RwLock<Option<Arc<IdpConfig>>>,
}

impl<S: ParameterSource> IdpConfigCache<S> {
    pub fn new(source: S, names: ParameterNames, idp_endpoint: Option<String>) -> Self {
        Self {
            source,
            names,
            idp_endpoint,
            cached: RwLock::new(None),
        }
    }

    /// Return the cached settings, fetching all four parameters on first use.
    ///
    /// A failed or partial fetch leaves the cache empty.
    pub async fn get_or_fetch(&self) -> Result<Arc<IdpConfig>, ConfigFetchError> {
        if let Some(cfg) = self.cached.read().await.as_ref() {
            return Ok(cfg.clone());
        }

        let (region, user_pool_id, client_id, hosted_domain) = tokio::try_join!(
            self.source.get_parameter(&self.names.region),
            self.source.get_parameter(&self.names.user_pool_id),
            self.source.get_parameter(&self.names.client_id),
            self.source.get_parameter(&self.names.hosted_domain),
        )?;

        let mut cfg = IdpConfig::new(region, user_pool_id, client_id, hosted_domain);
        if let Some(endpoint) = &self.idp_endpoint {
            cfg = cfg.with_idp_endpoint(endpoint.clone());
        }

        let mut guard = self.cached.write().await;
        let cfg = guard.get_or_insert_with(|| Arc::new(cfg)).clone();
        tracing::info!(
            region = %cfg.region,
            user_pool_id = %cfg.user_pool_id,
            "Identity provider configuration loaded"
        );
        Ok(cfg)
    }

    /// Whether the settings have been loaded.
    pub async fn is_loaded(&self) -> bool {
        self.cached.read().await.is_some()
    }
}

impl IdpConfigCache<AnySource> {
    /// A cache that is already populated and never consults a source.
    pub fn preloaded(cfg: IdpConfig) -> Self {
        Self {
            source: AnySource::Static(StaticParameterSource::default()),
            names: ParameterNames::from_prefix(""),
            idp_endpoint: None,
            cached: RwLock::new(Some(Arc::new(cfg))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigFetchError {
    #[error("parameter {name} could not be fetched: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("parameter {0} is missing or empty")]
    Missing(String),
}
