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
use tracing::info;

use crate::models::{collections, new_id, Food};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

#[derive(Deserialize)]
pub struct NewFood {
    pub name: String,
    pub price: BigDecimal,
    pub food_image: Option<String>,
    pub menu_id: String,
}

#[derive(Deserialize)]
pub struct FoodPatch {
    pub name: Option<String>,
    pub price: Option<BigDecimal>,
    pub food_image: Option<String>,
    pub menu_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FoodListResponse {
    pub total_count: u64,
    pub food_items: Vec<Food>,
}

pub async fn create_food(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(request): Json<NewFood>,
) -> ApiResult<Json<Food>> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request_msg(
            "INVALID_FOOD",
            "name must not be empty",
        ));
    }

    require_menu(&state, &request.menu_id).await?;

    let now = Utc::now();
    let food = Food {
        food_id: new_id(),
        name: request.name,
        // Prices are normalised to cents at the write boundary so reads
        // and the billing sum never re-round.
        price: round_to_cents(&request.price),
        food_image: request.food_image,
        menu_id: request.menu_id,
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&food)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::FOODS, doc),
    )
    .await?;

    info!(food_id = %food.food_id, menu_id = %food.menu_id, "Created food");
    Ok(Json(food))
}

pub async fn list_foods(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<FoodListResponse>> {
    let filter = Filter::new();
    let total_count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::FOODS, &filter),
    )
    .await?;

    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::FOODS, &filter),
    )
    .await?;

    let mut foods = Vec::with_capacity(docs.len());
    for doc in docs {
        foods.push(from_document::<Food>(doc)?);
    }

    Ok(Json(FoodListResponse {
        total_count,
        food_items: params.window().apply(foods),
    }))
}

pub async fn get_food(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(food_id): Path<String>,
) -> ApiResult<Json<Food>> {
    fetch_food(&state, &food_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("FOOD_NOT_FOUND"))
}

pub async fn update_food(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(food_id): Path<String>,
    Json(patch): Json<FoodPatch>,
) -> ApiResult<Json<Food>> {
    let mut fields = serde_json::Map::new();

    if let Some(name) = patch.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request_msg(
                "INVALID_FOOD",
                "name must not be empty",
            ));
        }
        fields.insert("name".into(), json!(name));
    }
    if let Some(price) = patch.price {
        fields.insert("price".into(), json!(round_to_cents(&price)));
    }
    if let Some(food_image) = patch.food_image {
        fields.insert("food_image".into(), json!(food_image));
    }
    if let Some(menu_id) = patch.menu_id {
        require_menu(&state, &menu_id).await?;
        fields.insert("menu_id".into(), json!(menu_id));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("food_id", food_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::FOODS,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("FOOD_NOT_FOUND"));
    }

    fetch_food(&state, &food_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("FOOD_NOT_FOUND"))
}

async fn fetch_food(state: &AppState, food_id: &str) -> Result<Option<Food>, ApiError> {
    let filter = Filter::new().eq("food_id", food_id);
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::FOODS, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}

async fn require_menu(state: &AppState, menu_id: &str) -> Result<(), ApiError> {
    let filter = Filter::new().eq("menu_id", menu_id);
    let count = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.count(collections::MENUS, &filter),
    )
    .await?;
    if count == 0 {
        return Err(ApiError::bad_request_msg(
            "MENU_NOT_FOUND",
            "menu was not found",
        ));
    }
    Ok(())
}
