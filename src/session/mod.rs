//! Browser-held session: Cognito cookie naming scheme.
//!
//! The session lives entirely in cookies; nothing is stored server-side.
//!
//! ```text
//! CognitoIdentityServiceProvider.<clientId>.LastAuthUser           = <username>
//! CognitoIdentityServiceProvider.<clientId>.<username>.idToken      = <JWT>
//! CognitoIdentityServiceProvider.<clientId>.<username>.accessToken  = <JWT>
//! CognitoIdentityServiceProvider.<clientId>.<username>.refreshToken = <token>
//! ```

pub mod cookie;

use crate::cognito::client::TokenSet;
use cookie::{CookieMap, CookieOptions, build_clear_cookie, build_set_cookie};

pub const PROVIDER_PREFIX: &str = "CognitoIdentityServiceProvider";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Id,
    Access,
    Refresh,
}

impl TokenKind {
    fn suffix(self) -> &'static str {
        match self {
            TokenKind::Id => "idToken",
            TokenKind::Access => "accessToken",
            TokenKind::Refresh => "refreshToken",
        }
    }
}

fn client_prefix(client_id: &str) -> String {
    format!("{PROVIDER_PREFIX}.{client_id}.")
}

pub fn last_auth_user_cookie(client_id: &str) -> String {
    format!("{PROVIDER_PREFIX}.{client_id}.LastAuthUser")
}

pub fn token_cookie(client_id: &str, username: &str, kind: TokenKind) -> String {
    format!("{PROVIDER_PREFIX}.{client_id}.{username}.{}", kind.suffix())
}

/// Resolve the session username for `client_id`.
///
/// `LastAuthUser` wins when present. Otherwise every non-empty
/// `<clientId>.<username>.accessToken` cookie is a candidate and the
/// lexicographically smallest username is chosen.
pub fn resolve_username(cookies: &CookieMap, client_id: &str) -> Option<String> {
    if let Some(user) = cookies
        .get(&last_auth_user_cookie(client_id))
        .filter(|u| !u.is_empty())
    {
        return Some(user.to_string());
    }

    let prefix = client_prefix(client_id);
    let suffix = format!(".{}", TokenKind::Access.suffix());
    cookies
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(name, _)| name.strip_prefix(&prefix)?.strip_suffix(&suffix))
        .filter(|user| !user.is_empty())
        .min()
        .map(String::from)
}

/// Access token for `client_id`, or `None` if no cookie matches.
pub fn access_token<'a>(cookies: &'a CookieMap, client_id: &str) -> Option<&'a str> {
    let username = resolve_username(cookies, client_id)?;
    cookies
        .get(&token_cookie(client_id, &username, TokenKind::Access))
        .filter(|t| !t.is_empty())
}

/// The session triple as presented by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookies {
    pub username: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCookies {
    /// Collect the session for `client_id`. `None` when no username resolves.
    pub fn from_cookies(cookies: &CookieMap, client_id: &str) -> Option<Self> {
        let username = resolve_username(cookies, client_id)?;
        let get = |kind| {
            cookies
                .get(&token_cookie(client_id, &username, kind))
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        Some(Self {
            id_token: get(TokenKind::Id),
            access_token: get(TokenKind::Access),
            refresh_token: get(TokenKind::Refresh),
            username,
        })
    }
}

/// `Set-Cookie` values establishing a session for `username`.
///
/// The refresh cookie is only written when the token set carries one.
pub fn session_set_cookies(
    client_id: &str,
    username: &str,
    tokens: &TokenSet,
    opts: &CookieOptions,
) -> Vec<String> {
    let mut headers = vec![
        build_set_cookie(&last_auth_user_cookie(client_id), username, opts),
        build_set_cookie(
            &token_cookie(client_id, username, TokenKind::Id),
            &tokens.id_token,
            opts,
        ),
        build_set_cookie(
            &token_cookie(client_id, username, TokenKind::Access),
            &tokens.access_token,
            opts,
        ),
    ];
    if let Some(refresh) = &tokens.refresh_token {
        headers.push(build_set_cookie(
            &token_cookie(client_id, username, TokenKind::Refresh),
            refresh,
            opts,
        ));
    }
    headers
}

/// Write a refreshed token set into `cookies` so the forwarded request
/// carries the new values.
pub fn apply_tokens(cookies: &mut CookieMap, client_id: &str, username: &str, tokens: &TokenSet) {
    cookies.set(last_auth_user_cookie(client_id), username);
    cookies.set(
        token_cookie(client_id, username, TokenKind::Id),
        tokens.id_token.as_str(),
    );
    cookies.set(
        token_cookie(client_id, username, TokenKind::Access),
        tokens.access_token.as_str(),
    );
    if let Some(refresh) = &tokens.refresh_token {
        cookies.set(
            token_cookie(client_id, username, TokenKind::Refresh),
            refresh.as_str(),
        );
    }
}

/// `Set-Cookie` values deleting every session cookie for `client_id`.
pub fn session_clear_cookies(
    cookies: &CookieMap,
    client_id: &str,
    opts: &CookieOptions,
) -> Vec<String> {
    let prefix = client_prefix(client_id);
    let last_auth = last_auth_user_cookie(client_id);
    let mut names: Vec<&str> = cookies
        .iter()
        .map(|(name, _)| name)
        .filter(|name| name.starts_with(&prefix))
        .collect();
    if !names.contains(&last_auth.as_str()) {
        names.push(last_auth.as_str());
    }
    names
        .into_iter()
        .map(|name| build_clear_cookie(name, opts))
        .collect()
}
