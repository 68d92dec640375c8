use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::AuthResult;

/// Pure, synchronous verifier for HS256 tokens signed with the shared
/// secret. No I/O happens here, so it is safe on the request hot path.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds.into();
        validation.validate_aud = false;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Parse and cryptographically verify a token, then decode its claims.
    ///
    /// Expiry is compared in UTC by the underlying library; an expired
    /// token fails even when its signature is valid.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let token_data = decode::<Value>(token, &self.decoding_key, &self.validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(user_id = %claims.user_id, "verified token successfully");
        Ok(claims)
    }
}
