use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no authorization provided")]
    MissingToken,
    #[error("token header is not valid UTF-8")]
    InvalidTokenHeader,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Every gate rejection is a 400 with an error message body; the
        // request is aborted before any handler logic runs.
        let code = match &self {
            AuthError::MissingToken | AuthError::InvalidTokenHeader => "AUTH_HEADER",
            AuthError::Malformed(_) => "AUTH_MALFORMED",
            AuthError::InvalidSignature => "AUTH_SIGNATURE",
            AuthError::Expired => "AUTH_EXPIRED",
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => "AUTH_CLAIMS",
        };

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        let mut response = (StatusCode::BAD_REQUEST, Json(body)).into_response();
        response
            .headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        response
    }
}
