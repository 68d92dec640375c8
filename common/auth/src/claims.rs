use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified token claims.
///
/// Immutable once decoded; handlers receive it read-only through the
/// request extractor.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            user_id: value.sub,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            issued_at,
            expires_at,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value)
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        Claims::try_from(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_claim_set() {
        let value = json!({
            "sub": "u1",
            "email": "a@b.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "iat": 1_700_000_000,
            "exp": 1_700_001_800
        });

        let claims = Claims::try_from(value).expect("claims");
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.first_name, "Ada");
        assert_eq!(claims.last_name, "Lovelace");
        assert_eq!(claims.expires_at.timestamp(), 1_700_001_800);
        assert_eq!(claims.issued_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn missing_identity_fields_default_to_empty() {
        // Refresh tokens deliberately carry only an expiry.
        let value = json!({ "sub": "", "exp": 1_700_001_800 });
        let claims = Claims::try_from(value).expect("claims");
        assert!(claims.email.is_empty());
        assert!(claims.issued_at.is_none());
    }

    #[test]
    fn rejects_payload_without_expiry() {
        let value = json!({ "sub": "u1" });
        let err = Claims::try_from(value).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }
}
