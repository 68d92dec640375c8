use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method, StatusCode,
};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{extract::FromRef, extract::State, middleware, Router};
use common_auth::{TokenVerifier, TOKEN_HEADER};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use crate::billing::BillingAggregator;
use crate::invoice_handlers::{create_invoice, get_invoice, list_invoices, update_invoice};
use crate::food_handlers::{create_food, get_food, list_foods, update_food};
use crate::menu_handlers::{create_menu, get_menu, list_menus, update_menu};
use crate::metrics::ServiceMetrics;
use crate::order_handlers::{create_order, get_order, list_orders, update_order};
use crate::order_item_handlers::{
    create_order_items, get_order_item, get_order_items_by_order, list_order_items,
    update_order_item,
};
use crate::sessions::SessionStore;
use crate::store::DocumentStore;
use crate::table_handlers::{create_table, get_table, list_tables, update_table};
use crate::tokens::TokenSigner;
use crate::user_handlers::{get_user, list_users, login, signup};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub verifier: Arc<TokenVerifier>,
    pub signer: Arc<TokenSigner>,
    pub sessions: SessionStore,
    pub billing: Arc<BillingAggregator>,
    pub metrics: Arc<ServiceMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        verifier: Arc<TokenVerifier>,
        signer: Arc<TokenSigner>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(store.clone()),
            billing: Arc::new(BillingAggregator::new(store.clone())),
            store,
            verifier,
            signer,
            metrics,
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> axum::response::Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encode error").into_response()
        }
    }
}

/// Counts error responses by code after the handler has run; the code
/// travels on the X-Error-Code header set by the error types.
async fn http_error_metrics(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown");
        state.metrics.http_error(code);
    }
    resp
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://localhost:8080",
    ];
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(TOKEN_HEADER),
        ]);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users", get(list_users))
        .route("/users/:user_id", get(get_user))
        .route("/tables", post(create_table).get(list_tables))
        .route("/tables/:table_id", get(get_table).patch(update_table))
        .route("/menus", post(create_menu).get(list_menus))
        .route("/menus/:menu_id", get(get_menu).patch(update_menu))
        .route("/foods", post(create_food).get(list_foods))
        .route("/foods/:food_id", get(get_food).patch(update_food))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:order_id", get(get_order).patch(update_order))
        .route(
            "/order-items",
            post(create_order_items).get(list_order_items),
        )
        .route(
            "/order-items/:order_item_id",
            get(get_order_item).patch(update_order_item),
        )
        .route(
            "/order-items/order/:order_id",
            get(get_order_items_by_order),
        )
        .route(
            "/invoices",
            post(create_invoice).get(list_invoices),
        )
        .route(
            "/invoices/:invoice_id",
            get(get_invoice).patch(update_invoice),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http_error_metrics,
        ))
        .with_state(state)
        .layer(cors)
}
