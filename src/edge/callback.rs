//! Authorization-code callback.
//!
//! The state check runs before any network call; a mismatch never
//! reaches the token endpoint.

use axum::extract::Query;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::{EdgeResponse, ViewerRequest, login, session_cookie_options};
use crate::AppState;
use crate::cognito::client::{self, TokenExchangeError, TokenSet};
use crate::cognito::jwt::decode_jwt_unverified;
use crate::config::{Config, IdpConfig};
use crate::error::AppError;
use crate::ocsf;
use crate::session::cookie::{CookieMap, build_clear_cookie};
use crate::session::session_set_cookies;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Callback parameters, if `req` is a callback from the provider.
pub fn callback_params(config: &Config, req: &ViewerRequest) -> Option<CallbackParams> {
    if req.path() != config.callback_path {
        return None;
    }
    let Query(params) = Query::<CallbackParams>::try_from_uri(&req.uri).ok()?;
    (params.code.is_some() || params.error.is_some()).then_some(params)
}

struct CompletedLogin {
    username: String,
    target: String,
    set_cookies: Vec<String>,
}

/// Finish the login. The state and PKCE cookies are cleared whatever
/// the outcome.
pub async fn handle_callback(
    state: &AppState,
    idp: &IdpConfig,
    req: &ViewerRequest,
    cookies: &CookieMap,
    params: CallbackParams,
) -> EdgeResponse {
    let flow_opts = login::flow_cookie_options(&state.config);
    let clear_flow = vec![
        build_clear_cookie(&login::state_cookie(&idp.client_id), &flow_opts),
        build_clear_cookie(&login::pkce_cookie(&idp.client_id), &flow_opts),
    ];

    match complete_login(state, idp, req, cookies, params).await {
        Ok(done) => {
            ocsf::authentication_event(
                ocsf::ACTIVITY_AUTH_TICKET,
                ocsf::STATUS_SUCCESS,
                ocsf::SEVERITY_INFORMATIONAL,
                Some(&done.username),
                "Authorization code exchange succeeded",
            );
            let mut set_cookies = done.set_cookies;
            set_cookies.extend(clear_flow);
            EdgeResponse::redirect(done.target, set_cookies)
        }
        Err(e) => {
            let severity = match e {
                AppError::InvalidCallback(_) => ocsf::SEVERITY_MEDIUM,
                _ => ocsf::SEVERITY_LOW,
            };
            ocsf::authentication_event(
                ocsf::ACTIVITY_AUTH_TICKET,
                ocsf::STATUS_FAILURE,
                severity,
                None,
                "Authorization code exchange failed",
            );
            tracing::warn!(error = %e, "Callback rejected");
            EdgeResponse::error(&e, clear_flow)
        }
    }
}

async fn complete_login(
    state: &AppState,
    idp: &IdpConfig,
    req: &ViewerRequest,
    cookies: &CookieMap,
    params: CallbackParams,
) -> Result<CompletedLogin, AppError> {
    if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or_default();
        return Err(AppError::InvalidCallback(format!(
            "provider returned {error}: {detail}"
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidCallback("missing code".into()))?;
    let returned_state = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidCallback("missing state".into()))?;
    let stored_state = cookies
        .get(&login::state_cookie(&idp.client_id))
        .ok_or_else(|| AppError::InvalidCallback("no state cookie".into()))?;

    if !bool::from(returned_state.as_bytes().ct_eq(stored_state.as_bytes())) {
        return Err(AppError::InvalidCallback("state mismatch".into()));
    }

    let verifier = cookies.get(&login::pkce_cookie(&idp.client_id));
    let redirect_uri = login::redirect_uri(&state.config, req);
    let tokens =
        client::exchange_code_for_tokens(&state.http_client, idp, &code, &redirect_uri, verifier)
            .await?;

    let username = username_from_tokens(&tokens).ok_or_else(|| {
        TokenExchangeError::InvalidResponse("id token carries no username".into())
    })?;

    let set_cookies = session_set_cookies(
        &idp.client_id,
        &username,
        &tokens,
        &session_cookie_options(&state.config),
    );

    Ok(CompletedLogin {
        target: login::return_target(&returned_state),
        username,
        set_cookies,
    })
}

/// Username from the ID token returned by the token endpoint, falling
/// back to `sub`.
fn username_from_tokens(tokens: &TokenSet) -> Option<String> {
    let claims = decode_jwt_unverified(&tokens.id_token).ok()?;
    let username = claims.username().unwrap_or(&claims.sub);
    (!username.is_empty()).then(|| username.to_string())
}
