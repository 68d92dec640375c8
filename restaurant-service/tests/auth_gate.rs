use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use common_auth::{JwtConfig, TokenVerifier};
use http_body_util::BodyExt;
use restaurant_service::metrics::ServiceMetrics;
use restaurant_service::store::MemoryStore;
use restaurant_service::tokens::{TokenConfig, TokenSigner, TokenSubject};
use restaurant_service::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "gate-test-secret";

fn test_router() -> (Router, Arc<TokenSigner>) {
    let store = Arc::new(MemoryStore::new());
    let verifier = Arc::new(TokenVerifier::new(JwtConfig::new(SECRET)));
    let signer = Arc::new(
        TokenSigner::new(TokenConfig {
            secret: SECRET.to_string(),
            access_ttl_seconds: 30 * 60,
            refresh_ttl_seconds: 24 * 60 * 60,
        })
        .expect("signer"),
    );
    let metrics = Arc::new(ServiceMetrics::new().expect("metrics"));

    let state = AppState::new(store, verifier, signer.clone(), metrics);
    (build_router(state), signer)
}

fn subject() -> TokenSubject {
    TokenSubject {
        user_id: "u1".to_string(),
        email: "ada@example.com".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_check_is_open() {
    let (router, _) = test_router();
    let response = router
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_rejects_missing_token_with_400() {
    let (router, _) = test_router();
    let response = router
        .oneshot(Request::get("/tables").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AUTH_HEADER");
}

#[tokio::test]
async fn protected_route_rejects_expired_token_with_400() {
    let (router, signer) = test_router();
    let past = Utc::now() - Duration::minutes(31);
    let issued = signer.issue_at(&subject(), past).expect("issue");

    let response = router
        .oneshot(
            Request::get("/tables")
                .header("token", issued.access_token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AUTH_EXPIRED");
}

#[tokio::test]
async fn protected_route_accepts_valid_token() {
    let (router, signer) = test_router();
    let issued = signer.issue(&subject()).expect("issue");

    let response = router
        .oneshot(
            Request::get("/tables")
                .header("token", issued.access_token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn signup_then_login_then_list_users() {
    let (router, _) = test_router();

    let signup = Request::post("/users/signup")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "phone": "555-0100",
                "password": "secret1"
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(signup).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password").is_none());

    let login = Request::post("/users/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": "secret1" }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().expect("token").to_string();

    let list = Request::get("/users")
        .header("token", token)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["user_items"][0]["email"], "ada@example.com");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (router, _) = test_router();

    let signup = Request::post("/users/signup")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "phone": "555-0100",
                "password": "secret1"
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(signup).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let login = Request::post("/users/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": "wrong" }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}
