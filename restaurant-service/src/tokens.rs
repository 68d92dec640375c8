use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;

/// Token issuance settings. Defaults follow the session policy:
/// access tokens live 30 minutes, refresh tokens 24 hours.
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signer(#[from] jsonwebtoken::errors::Error),
}

/// Identity fields carried by the access token.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues the signed access/refresh token pair. Issuance is pure (no
/// I/O); persisting the pair is the session store's concern, so
/// verification stays a fast local operation on the request path.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Result<Self, SigningError> {
        if config.secret.trim().is_empty() {
            return Err(SigningError::MissingSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds),
        })
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<IssuedTokens, SigningError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a pair anchored at an explicit clock reading.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<IssuedTokens, SigningError> {
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access_claims = AccessClaims {
            sub: &subject.user_id,
            email: &subject.email,
            first_name: &subject.first_name,
            last_name: &subject.last_name,
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
        };

        // Minimal refresh-token policy: no identity fields, only expiry.
        let refresh_claims = RefreshClaims {
            exp: refresh_expires_at.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(&header, &access_claims, &self.encoding_key)?;
        let refresh_token = encode(&header, &refresh_claims, &self.encoding_key)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }
}

#[derive(Serialize)]
struct AccessClaims<'a> {
    sub: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct RefreshClaims {
    exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(TokenConfig {
            secret: "unit-test-secret".to_string(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        })
        .expect("signer")
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: "u1".to_string(),
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[test]
    fn rejects_empty_secret() {
        let err = TokenSigner::new(TokenConfig {
            secret: "  ".to_string(),
            access_ttl_seconds: 60,
            refresh_ttl_seconds: 60,
        })
        .err()
        .expect("should fail");
        assert!(matches!(err, SigningError::MissingSecret));
    }

    #[test]
    fn expiry_policy_is_30_minutes_and_24_hours() {
        let now = Utc::now();
        let issued = signer().issue_at(&subject(), now).expect("issue");
        assert_eq!((issued.access_expires_at - now).num_minutes(), 30);
        assert_eq!((issued.refresh_expires_at - now).num_hours(), 24);
    }

    #[test]
    fn tokens_are_distinct_signed_strings() {
        let issued = signer().issue(&subject()).expect("issue");
        assert_ne!(issued.access_token, issued.refresh_token);
        assert_eq!(issued.access_token.matches('.').count(), 2);
        assert_eq!(issued.refresh_token.matches('.').count(), 2);
    }
}
