use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use common_auth::{JwtConfig, TokenVerifier};
use http_body_util::BodyExt;
use restaurant_service::metrics::ServiceMetrics;
use restaurant_service::models::{collections, Food};
use restaurant_service::store::{to_document, DocumentStore, MemoryStore};
use restaurant_service::tokens::{TokenConfig, TokenSigner, TokenSubject};
use restaurant_service::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "billing-api-test-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    token: String,
}

fn test_app() -> TestApp {
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

    let issued = signer
        .issue(&TokenSubject {
            user_id: "u1".to_string(),
            email: "staff@example.com".to_string(),
            first_name: "Staff".to_string(),
            last_name: "Member".to_string(),
        })
        .expect("issue");

    let state = AppState::new(store.clone(), verifier, signer, metrics);
    TestApp {
        router: build_router(state),
        store,
        token: issued.access_token,
    }
}

impl TestApp {
    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .header("token", &self.token)
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router.clone(), request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header("token", &self.token)
            .body(Body::empty())
            .unwrap();
        send(self.router.clone(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn seed_food(store: &MemoryStore, food_id: &str, name: &str, price: &str) {
    let now = chrono::Utc::now();
    let food = Food {
        food_id: food_id.to_string(),
        name: name.to_string(),
        price: bigdecimal::BigDecimal::parse_bytes(price.as_bytes(), 10).unwrap(),
        food_image: None,
        menu_id: "m1".to_string(),
        created_at: now,
        updated_at: now,
    };
    store
        .insert_one(collections::FOODS, to_document(&food).expect("encode"))
        .await
        .expect("insert");
}

#[tokio::test]
async fn order_items_batch_creates_an_order_and_bills_it() {
    let app = test_app();
    seed_food(&app.store, "f1", "soup", "12.50").await;
    seed_food(&app.store, "f2", "bread", "7.25").await;

    let (status, table) = app
        .post("/tables", json!({ "table_number": 4, "number_of_guests": 2 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let table_id = table["table_id"].as_str().expect("table_id");

    let (status, created) = app
        .post(
            "/order-items",
            json!({
                "table_id": table_id,
                "order_items": [
                    { "food_id": "f1", "quantity": 1, "unit_price": "12.50" },
                    { "food_id": "f2", "quantity": 3, "unit_price": "7.25" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = created["order_id"].as_str().expect("order_id");
    assert_eq!(created["order_items"].as_array().map(Vec::len), Some(2));

    let (status, summaries) = app.get(&format!("/order-items/order/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &summaries[0];
    assert_eq!(summary["payment_due"], json!("19.75"));
    assert_eq!(summary["total_count"], 2);
    assert_eq!(summary["table_number"], 4);
    assert_eq!(summary["order_items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn billing_an_unknown_order_is_not_found() {
    let app = test_app();
    let (status, body) = app.get("/order-items/order/no-such-order").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ORDER_ITEMS_NOT_FOUND");
}

#[tokio::test]
async fn order_items_require_an_existing_table() {
    let app = test_app();
    let (status, body) = app
        .post(
            "/order-items",
            json!({
                "table_id": "no-such-table",
                "order_items": [
                    { "food_id": "f1", "quantity": 1, "unit_price": "5.00" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TABLE_NOT_FOUND");
}

#[tokio::test]
async fn invoice_read_includes_the_billing_view() {
    let app = test_app();
    seed_food(&app.store, "f1", "soup", "12.50").await;

    let (_, table) = app
        .post("/tables", json!({ "table_number": 9, "number_of_guests": 2 }))
        .await;
    let table_id = table["table_id"].as_str().expect("table_id");

    let (_, created) = app
        .post(
            "/order-items",
            json!({
                "table_id": table_id,
                "order_items": [
                    { "food_id": "f1", "quantity": 1, "unit_price": "12.50" }
                ]
            }),
        )
        .await;
    let order_id = created["order_id"].as_str().expect("order_id");

    let (status, invoice) = app
        .post("/invoices", json!({ "order_id": order_id, "payment_method": "CARD" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["payment_status"], "PENDING");
    let invoice_id = invoice["invoice_id"].as_str().expect("invoice_id");

    let (status, view) = app.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["payment_due"], json!("12.50"));
    assert_eq!(view["table_number"], 9);
    assert_eq!(view["payment_method"], "CARD");
}
