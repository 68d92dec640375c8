use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::{collections, new_id, Menu};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

#[derive(Deserialize)]
pub struct NewMenu {
    pub name: String,
    pub category: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct MenuPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// A menu window is only accepted when it lies ahead of the clock and
/// is non-empty: start after now, end after start.
fn valid_window(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start > now && end > start
}

pub async fn create_menu(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(request): Json<NewMenu>,
) -> ApiResult<Json<Menu>> {
    if request.name.trim().is_empty() || request.category.trim().is_empty() {
        return Err(ApiError::bad_request_msg(
            "INVALID_MENU",
            "name and category must not be empty",
        ));
    }

    if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
        if !valid_window(start, end, Utc::now()) {
            return Err(invalid_window());
        }
    }

    let now = Utc::now();
    let menu = Menu {
        menu_id: new_id(),
        name: request.name,
        category: request.category,
        start_date: request.start_date,
        end_date: request.end_date,
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&menu)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::MENUS, doc),
    )
    .await?;

    info!(menu_id = %menu.menu_id, "Created menu");
    Ok(Json(menu))
}

pub async fn list_menus(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<Menu>>> {
    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::MENUS, &Filter::new()),
    )
    .await?;

    let mut menus = Vec::with_capacity(docs.len());
    for doc in docs {
        menus.push(from_document::<Menu>(doc)?);
    }

    Ok(Json(params.window().apply(menus)))
}

pub async fn get_menu(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(menu_id): Path<String>,
) -> ApiResult<Json<Menu>> {
    fetch_menu(&state, &menu_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("MENU_NOT_FOUND"))
}

pub async fn update_menu(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(menu_id): Path<String>,
    Json(patch): Json<MenuPatch>,
) -> ApiResult<Json<Menu>> {
    let mut fields = serde_json::Map::new();

    if let (Some(start), Some(end)) = (patch.start_date, patch.end_date) {
        if !valid_window(start, end, Utc::now()) {
            return Err(invalid_window());
        }
        fields.insert("start_date".into(), json!(start));
        fields.insert("end_date".into(), json!(end));
    }

    if let Some(name) = patch.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request_msg(
                "INVALID_MENU",
                "name must not be empty",
            ));
        }
        fields.insert("name".into(), json!(name));
    }
    if let Some(category) = patch.category {
        if category.trim().is_empty() {
            return Err(ApiError::bad_request_msg(
                "INVALID_MENU",
                "category must not be empty",
            ));
        }
        fields.insert("category".into(), json!(category));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("menu_id", menu_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::MENUS,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("MENU_NOT_FOUND"));
    }

    fetch_menu(&state, &menu_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("MENU_NOT_FOUND"))
}

async fn fetch_menu(state: &AppState, menu_id: &str) -> Result<Option<Menu>, ApiError> {
    let filter = Filter::new().eq("menu_id", menu_id);
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::MENUS, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}

fn invalid_window() -> ApiError {
    ApiError::bad_request_msg(
        "INVALID_MENU_WINDOW",
        "kindly retype the time: start must be in the future and end after start",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_must_start_in_future_and_end_after_start() {
        let now = Utc::now();
        assert!(valid_window(
            now + Duration::hours(1),
            now + Duration::hours(2),
            now
        ));
        assert!(!valid_window(
            now - Duration::hours(1),
            now + Duration::hours(2),
            now
        ));
        assert!(!valid_window(
            now + Duration::hours(2),
            now + Duration::hours(1),
            now
        ));
        assert!(!valid_window(
            now + Duration::hours(1),
            now + Duration::hours(1),
            now
        ));
    }
}
