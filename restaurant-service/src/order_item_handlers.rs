use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use common_money::round_to_cents;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::billing::BillingSummary;
use crate::models::{collections, new_id, OrderItem};
use crate::order_handlers::{new_order_record, require_table};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

#[derive(Deserialize)]
pub struct NewOrderItem {
    pub food_id: String,
    pub quantity: i64,
    pub unit_price: BigDecimal,
}

/// Batch create: one table, many items. Opens the owning order as part
/// of the same request.
#[derive(Deserialize)]
pub struct OrderItemsPack {
    pub table_id: String,
    pub order_items: Vec<NewOrderItem>,
}

#[derive(Deserialize)]
pub struct OrderItemPatch {
    pub quantity: Option<i64>,
    pub unit_price: Option<BigDecimal>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemsCreated {
    pub order_id: String,
    pub order_items: Vec<OrderItem>,
}

pub async fn create_order_items(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(pack): Json<OrderItemsPack>,
) -> ApiResult<Json<OrderItemsCreated>> {
    if pack.order_items.is_empty() {
        return Err(ApiError::bad_request_msg(
            "INVALID_ORDER_ITEMS",
            "order_items must not be empty",
        ));
    }

    require_table(&state, &pack.table_id).await?;

    let order = new_order_record(&pack.table_id);
    let order_doc = to_document(&order)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::ORDERS, order_doc),
    )
    .await?;

    let now = Utc::now();
    let mut items = Vec::with_capacity(pack.order_items.len());
    for request in pack.order_items {
        if request.quantity <= 0 {
            return Err(ApiError::bad_request_msg(
                "INVALID_ORDER_ITEMS",
                "quantity must be positive",
            ));
        }
        items.push(OrderItem {
            order_item_id: new_id(),
            order_id: order.order_id.clone(),
            food_id: request.food_id,
            quantity: request.quantity,
            unit_price: round_to_cents(&request.unit_price),
            created_at: now,
            updated_at: now,
        });
    }

    let mut docs = Vec::with_capacity(items.len());
    for item in &items {
        docs.push(to_document(item)?);
    }
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_many(collections::ORDER_ITEMS, docs),
    )
    .await?;

    info!(
        order_id = %order.order_id,
        table_id = %order.table_id,
        count = items.len(),
        "Created order items"
    );

    Ok(Json(OrderItemsCreated {
        order_id: order.order_id,
        order_items: items,
    }))
}

pub async fn list_order_items(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<OrderItem>>> {
    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state
            .store
            .find_many(collections::ORDER_ITEMS, &Filter::new()),
    )
    .await?;

    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        items.push(from_document::<OrderItem>(doc)?);
    }

    Ok(Json(params.window().apply(items)))
}

pub async fn get_order_item(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(order_item_id): Path<String>,
) -> ApiResult<Json<OrderItem>> {
    let filter = Filter::new().eq("order_item_id", order_item_id.as_str());
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::ORDER_ITEMS, &filter),
    )
    .await?;

    match found {
        Some(doc) => Ok(Json(from_document::<OrderItem>(doc)?)),
        None => Err(ApiError::not_found("ORDER_ITEM_NOT_FOUND")),
    }
}

pub async fn update_order_item(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(order_item_id): Path<String>,
    Json(patch): Json<OrderItemPatch>,
) -> ApiResult<Json<OrderItem>> {
    let mut fields = serde_json::Map::new();
    if let Some(quantity) = patch.quantity {
        if quantity <= 0 {
            return Err(ApiError::bad_request_msg(
                "INVALID_ORDER_ITEMS",
                "quantity must be positive",
            ));
        }
        fields.insert("quantity".into(), json!(quantity));
    }
    if let Some(unit_price) = patch.unit_price {
        fields.insert("unit_price".into(), json!(round_to_cents(&unit_price)));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("order_item_id", order_item_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::ORDER_ITEMS,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("ORDER_ITEM_NOT_FOUND"));
    }

    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::ORDER_ITEMS, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Json(from_document::<OrderItem>(doc)?)),
        None => Err(ApiError::not_found("ORDER_ITEM_NOT_FOUND")),
    }
}

/// Billing view for one order: items joined with food and table data,
/// grouped with the amount due.
pub async fn get_order_items_by_order(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Vec<BillingSummary>>> {
    let summaries = match state.billing.items_by_order(&order_id).await {
        Ok(summaries) => summaries,
        Err(err) => {
            state.metrics.billing_aggregation("error");
            warn!(order_id = %order_id, error = %err, "Billing aggregation failed");
            return Err(err.into());
        }
    };

    if summaries.is_empty() {
        state.metrics.billing_aggregation("empty");
        return Err(ApiError::not_found("ORDER_ITEMS_NOT_FOUND"));
    }

    state.metrics.billing_aggregation("success");
    Ok(Json(summaries))
}
