use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::{collections, new_id, Order};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

#[derive(Deserialize)]
pub struct NewOrder {
    pub table_id: String,
}

#[derive(Deserialize)]
pub struct OrderPatch {
    pub table_id: Option<String>,
}

pub async fn create_order(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(request): Json<NewOrder>,
) -> ApiResult<Json<Order>> {
    require_table(&state, &request.table_id).await?;

    let order = new_order_record(&request.table_id);
    let doc = to_document(&order)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::ORDERS, doc),
    )
    .await?;

    info!(order_id = %order.order_id, table_id = %order.table_id, "Created order");
    Ok(Json(order))
}

pub async fn list_orders(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<Order>>> {
    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::ORDERS, &Filter::new()),
    )
    .await?;

    let mut orders = Vec::with_capacity(docs.len());
    for doc in docs {
        orders.push(from_document::<Order>(doc)?);
    }

    Ok(Json(params.window().apply(orders)))
}

pub async fn get_order(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    fetch_order(&state, &order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("ORDER_NOT_FOUND"))
}

pub async fn update_order(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(patch): Json<OrderPatch>,
) -> ApiResult<Json<Order>> {
    let mut fields = serde_json::Map::new();
    if let Some(table_id) = patch.table_id {
        require_table(&state, &table_id).await?;
        fields.insert("table_id".into(), json!(table_id));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("order_id", order_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::ORDERS,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("ORDER_NOT_FOUND"));
    }

    fetch_order(&state, &order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("ORDER_NOT_FOUND"))
}

/// Build a fresh order record for a table. Shared with the order-items
/// batch endpoint, which opens an order implicitly.
pub fn new_order_record(table_id: &str) -> Order {
    let now = Utc::now();
    Order {
        order_id: new_id(),
        table_id: table_id.to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) async fn require_table(state: &AppState, table_id: &str) -> Result<(), ApiError> {
    let filter = Filter::new().eq("table_id", table_id);
    let count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::TABLES, &filter),
    )
    .await?;
    if count == 0 {
        return Err(ApiError::bad_request_msg(
            "TABLE_NOT_FOUND",
            "table was not found",
        ));
    }
    Ok(())
}

pub(crate) async fn fetch_order(
    state: &AppState,
    order_id: &str,
) -> Result<Option<Order>, ApiError> {
    let filter = Filter::new().eq("order_id", order_id);
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::ORDERS, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}
