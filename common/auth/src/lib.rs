pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod verifier;

pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, TOKEN_HEADER};
pub use verifier::TokenVerifier;
