//! Cookie parsing and `Set-Cookie` encoding.
//!
//! Parsing is permissive: pairs without a name or `=` are skipped and the
//! first occurrence of a name wins. Encoding always emits attributes in
//! the same order: `HttpOnly`, `SameSite`, `Max-Age`, `Path`, `Secure`.

use axum::http::HeaderValue;
use std::collections::BTreeMap;
use std::fmt;

/// Cookie name → value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieMap(BTreeMap<String, String>);

impl CookieMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace or add a cookie.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    fn insert_first(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Serialize back into a `Cookie` request header.
    pub fn to_header(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Anything a cookie map can be pulled out of.
pub trait CookieSource {
    fn cookies(&self) -> CookieMap;
}

impl CookieSource for CookieMap {
    fn cookies(&self) -> CookieMap {
        self.clone()
    }
}

/// Parse `name=value` pairs (HTTP API v2 `cookies` array).
pub fn parse_list<I, S>(pairs: I) -> CookieMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = CookieMap::default();
    for pair in pairs {
        if let Some((name, value)) = parse_pair(pair.as_ref()) {
            map.insert_first(name, value);
        }
    }
    map
}

/// Parse a `Cookie` header (`k1=v1; k2=v2`).
pub fn parse_header(header: &str) -> CookieMap {
    parse_list(header.split(';'))
}

/// `name=value` pairs across one or more raw `Cookie` header values.
///
/// Headers are split on `;` before any UTF-8 check, so a single pair with
/// invalid bytes is dropped without hiding its neighbours.
pub fn header_pairs<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a HeaderValue>,
{
    values
        .into_iter()
        .flat_map(|v| v.as_bytes().split(|b| *b == b';'))
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect()
}

/// Parse raw `Cookie` header values.
pub fn parse_header_values<'a, I>(values: I) -> CookieMap
where
    I: IntoIterator<Item = &'a HeaderValue>,
{
    parse_list(header_pairs(values))
}

fn parse_pair(pair: &str) -> Option<(&str, &str)> {
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

/// Attributes for an emitted cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub max_age_secs: Option<u64>,
    pub secure: bool,
    pub path: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: false,
            same_site: None,
            max_age_secs: None,
            secure: false,
            path: Some("/".into()),
        }
    }
}

impl CookieOptions {
    /// `HttpOnly; SameSite=Lax` with the given lifetime.
    pub fn http_only_lax(max_age_secs: u64, secure: bool) -> Self {
        Self {
            http_only: true,
            same_site: Some(SameSite::Lax),
            max_age_secs: Some(max_age_secs),
            secure,
            ..Self::default()
        }
    }
}

/// Encode a `Set-Cookie` header value.
pub fn build_set_cookie(name: &str, value: &str, opts: &CookieOptions) -> String {
    let mut parts = vec![format!("{name}={value}")];
    if opts.http_only {
        parts.push("HttpOnly".into());
    }
    if let Some(same_site) = opts.same_site {
        parts.push(format!("SameSite={same_site}"));
    }
    if let Some(max_age) = opts.max_age_secs {
        parts.push(format!("Max-Age={max_age}"));
    }
    if let Some(path) = &opts.path {
        parts.push(format!("Path={path}"));
    }
    if opts.secure {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Encode a `Set-Cookie` that deletes `name`.
pub fn build_clear_cookie(name: &str, opts: &CookieOptions) -> String {
    let opts = CookieOptions {
        max_age_secs: Some(0),
        ..opts.clone()
    };
    build_set_cookie(name, "", &opts)
}

/// Access token for `client_id`, following the Cognito naming scheme.
pub fn find_access_token<'a>(cookies: &'a CookieMap, client_id: &str) -> Option<&'a str> {
    super::access_token(cookies, client_id)
}
