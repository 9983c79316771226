//! Logout: clear the session cookies and hand off to the hosted logout.

use super::{EdgeResponse, ViewerRequest, session_cookie_options};
use crate::config::{Config, IdpConfig};
use crate::ocsf;
use crate::session::cookie::CookieMap;
use crate::session::{resolve_username, session_clear_cookies};

pub fn logout(
    config: &Config,
    idp: &IdpConfig,
    req: &ViewerRequest,
    cookies: &CookieMap,
) -> EdgeResponse {
    let username = resolve_username(cookies, &idp.client_id);
    let set_cookies =
        session_clear_cookies(cookies, &idp.client_id, &session_cookie_options(config));

    let logout_uri = config
        .logout_uri
        .clone()
        .unwrap_or_else(|| format!("{}/", req.origin));

    ocsf::authentication_event(
        ocsf::ACTIVITY_LOGOFF,
        ocsf::STATUS_SUCCESS,
        ocsf::SEVERITY_INFORMATIONAL,
        username.as_deref(),
        "User logged out",
    );
    EdgeResponse::redirect(idp.logout_url(&logout_uri), set_cookies)
}
