//! Cognito integration: parameter source, token endpoint, JWT verification.

pub mod client;
pub mod jwt;
pub mod params;
