//! Single-attempt session refresh with the refresh token.

use crate::AppState;
use crate::cognito::client::{self, TokenExchangeError};
use crate::config::IdpConfig;
use crate::ocsf;
use crate::session::cookie::CookieMap;
use crate::session::{apply_tokens, session_set_cookies};

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed {
    /// `Set-Cookie` values for the viewer response.
    pub set_cookies: Vec<String>,
    /// Replacement `Cookie` header for the forwarded request.
    pub cookie_header: String,
}

/// Exchange `refresh_token` for a new token pair. The refresh cookie is
/// rewritten only when the provider rotates it.
pub async fn refresh_session(
    state: &AppState,
    idp: &IdpConfig,
    username: &str,
    refresh_token: &str,
    cookies: &CookieMap,
) -> Result<Refreshed, TokenExchangeError> {
    let result = client::refresh_tokens(&state.http_client, idp, refresh_token).await;

    let tokens = match result {
        Ok(tokens) => tokens,
        Err(e) => {
            ocsf::authentication_event(
                ocsf::ACTIVITY_SERVICE_TICKET,
                ocsf::STATUS_FAILURE,
                ocsf::SEVERITY_LOW,
                Some(username),
                "Token refresh failed",
            );
            return Err(e);
        }
    };

    let set_cookies = session_set_cookies(
        &idp.client_id,
        username,
        &tokens,
        &super::session_cookie_options(&state.config),
    );
    let mut forwarded = cookies.clone();
    apply_tokens(&mut forwarded, &idp.client_id, username, &tokens);

    ocsf::authentication_event(
        ocsf::ACTIVITY_SERVICE_TICKET,
        ocsf::STATUS_SUCCESS,
        ocsf::SEVERITY_INFORMATIONAL,
        Some(username),
        "Token refresh succeeded",
    );

    Ok(Refreshed {
        set_cookies,
        cookie_header: forwarded.to_header(),
    })
}
