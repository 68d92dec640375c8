use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::models::{collections, new_id, User};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::tokens::TokenSubject;
use crate::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public projection of a user record. Credential and session fields
/// never leave the service.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Retained for backward compatibility with existing clients.
    pub token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub total_count: u64,
    pub user_items: Vec<UserView>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_signup(&request)?;

    let email_filter = Filter::new().eq("email", request.email.as_str());
    let email_count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::USERS, &email_filter),
    )
    .await?;

    let phone_filter = Filter::new().eq("phone", request.phone.as_str());
    let phone_count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::USERS, &phone_filter),
    )
    .await?;

    if email_count > 0 || phone_count > 0 {
        return Err(ApiError::bad_request_msg(
            "USER_EXISTS",
            "this email or phone number already exists",
        ));
    }

    let password_hash = hash_password(&request.password)?;
    let now = Utc::now();
    let user_id = new_id();

    let subject = TokenSubject {
        user_id: user_id.clone(),
        email: request.email.clone(),
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
    };
    let issued = state.signer.issue(&subject).map_err(|err| {
        error!(error = %err, "Failed to issue tokens at signup");
        ApiError::internal(err, None)
    })?;

    let user = User {
        user_id: user_id.clone(),
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        phone: request.phone,
        password: password_hash,
        avatar: request.avatar,
        token: Some(issued.access_token.clone()),
        refresh_token: Some(issued.refresh_token.clone()),
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&user)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::USERS, doc),
    )
    .await?;

    info!(user_id = %user_id, "Registered new user");

    Ok(Json(auth_response(issued, user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let filter = Filter::new().eq("email", request.email.as_str());
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::USERS, &filter),
    )
    .await?;

    let user: User = match found {
        Some(doc) => from_document(doc)?,
        None => {
            state.metrics.login_attempt("unknown_email");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&user.password, &request.password) {
        state.metrics.login_attempt("bad_password");
        warn!(user_id = %user.user_id, "Rejected login with wrong password");
        return Err(invalid_credentials());
    }

    let subject = TokenSubject {
        user_id: user.user_id.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    };
    let issued = state.signer.issue(&subject).map_err(|err| {
        error!(user_id = %user.user_id, error = %err, "Failed to issue tokens");
        ApiError::internal(err, None)
    })?;

    state
        .sessions
        .save_token_pair(&user.user_id, &issued.access_token, &issued.refresh_token)
        .await?;

    state.metrics.login_attempt("success");
    info!(user_id = %user.user_id, "User logged in");

    Ok(Json(auth_response(issued, user.into())))
}

pub async fn list_users(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<UserListResponse>> {
    let filter = Filter::new();
    let total_count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::USERS, &filter),
    )
    .await?;

    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::USERS, &filter),
    )
    .await?;

    let mut users = Vec::with_capacity(docs.len());
    for doc in docs {
        let user: User = from_document(doc)?;
        users.push(UserView::from(user));
    }

    let user_items = params.window().apply(users);

    Ok(Json(UserListResponse {
        total_count,
        user_items,
    }))
}

pub async fn get_user(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let filter = Filter::new().eq("user_id", user_id.as_str());
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::USERS, &filter),
    )
    .await?;

    match found {
        Some(doc) => {
            let user: User = from_document(doc)?;
            Ok(Json(user.into()))
        }
        None => Err(ApiError::not_found("USER_NOT_FOUND")),
    }
}

fn auth_response(issued: crate::tokens::IssuedTokens, user: UserView) -> AuthResponse {
    AuthResponse {
        token: issued.access_token.clone(),
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
        access_token_expires_at: issued
            .access_expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        refresh_token_expires_at: issued
            .refresh_expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        user,
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized(
        "INVALID_CREDENTIALS",
        "Invalid credentials. Please try again.",
    )
}

fn validate_signup(request: &SignupRequest) -> Result<(), ApiError> {
    let required = [
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
        ("email", &request.email),
        ("phone", &request.phone),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request_msg(
                "INVALID_USER",
                format!("{field} must not be empty"),
            ));
        }
    }

    if request.password.len() < 6 {
        return Err(ApiError::bad_request_msg(
            "INVALID_USER",
            "password must be at least 6 characters",
        ));
    }

    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {err}"), None))
}

fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter42").expect("hash");
        assert!(verify_password(&hash, "hunter42"));
        assert!(!verify_password(&hash, "hunter43"));
    }

    #[test]
    fn verify_rejects_unparseable_hash() {
        assert!(!verify_password("plaintext-not-a-hash", "plaintext-not-a-hash"));
    }

    #[test]
    fn signup_validation_rejects_blank_and_short() {
        let mut request = SignupRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
            password: "secret1".into(),
            avatar: None,
        };
        assert!(validate_signup(&request).is_ok());

        request.email = "  ".into();
        assert!(validate_signup(&request).is_err());

        request.email = "ada@example.com".into();
        request.password = "short".into();
        assert!(validate_signup(&request).is_err());
    }
}
