/// Runtime configuration for token verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret; the issuer and verifier live in the same process.
    pub secret: String,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with exact expiry comparison (zero leeway).
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            leeway_seconds: 0,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}
