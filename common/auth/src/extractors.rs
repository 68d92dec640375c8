use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::TokenVerifier;

/// Header carrying the access token on protected routes.
pub const TOKEN_HEADER: &str = "token";

/// Extracts verified claims from the request using the configured verifier.
///
/// Runs once per request before any handler logic; verification is
/// synchronous and local, so there is nothing to retry or time out.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<TokenVerifier>::from_ref(state);

        let token = parse_token_header(&parts.headers)?;
        let claims = verifier.verify(&token)?;

        Ok(Self { claims, token })
    }
}

fn parse_token_header(headers: &HeaderMap) -> AuthResult<String> {
    let value = headers.get(TOKEN_HEADER).ok_or(AuthError::MissingToken)?;

    let token = value
        .to_str()
        .map_err(|_| AuthError::InvalidTokenHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parse_token_header_accepts_value() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("abc.def.ghi"));
        let token = parse_token_header(&headers).expect("token");
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn parse_token_header_rejects_missing_header() {
        let headers = HeaderMap::new();
        let err = parse_token_header(&headers).expect_err("should reject");
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[test]
    fn parse_token_header_rejects_blank_value() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("   "));
        let err = parse_token_header(&headers).expect_err("should reject");
        assert!(matches!(err, AuthError::MissingToken));
    }
}
