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

use crate::models::{collections, new_id, Table};
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

#[derive(Deserialize)]
pub struct NewTable {
    pub table_number: i64,
    pub number_of_guests: i64,
}

#[derive(Deserialize)]
pub struct TablePatch {
    pub table_number: Option<i64>,
    pub number_of_guests: Option<i64>,
}

pub async fn create_table(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(request): Json<NewTable>,
) -> ApiResult<Json<Table>> {
    if request.table_number <= 0 || request.number_of_guests <= 0 {
        return Err(ApiError::bad_request_msg(
            "INVALID_TABLE",
            "table_number and number_of_guests must be positive",
        ));
    }

    let now = Utc::now();
    let table = Table {
        table_id: new_id(),
        table_number: request.table_number,
        number_of_guests: request.number_of_guests,
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&table)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::TABLES, doc),
    )
    .await?;

    info!(table_id = %table.table_id, table_number = table.table_number, "Created table");
    Ok(Json(table))
}

pub async fn list_tables(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<Table>>> {
    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::TABLES, &Filter::new()),
    )
    .await?;

    let mut tables = Vec::with_capacity(docs.len());
    for doc in docs {
        tables.push(from_document::<Table>(doc)?);
    }

    Ok(Json(params.window().apply(tables)))
}

pub async fn get_table(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(table_id): Path<String>,
) -> ApiResult<Json<Table>> {
    fetch_table(&state, &table_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TABLE_NOT_FOUND"))
}

pub async fn update_table(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(table_id): Path<String>,
    Json(patch): Json<TablePatch>,
) -> ApiResult<Json<Table>> {
    let mut fields = serde_json::Map::new();
    if let Some(table_number) = patch.table_number {
        if table_number <= 0 {
            return Err(ApiError::bad_request_msg(
                "INVALID_TABLE",
                "table_number must be positive",
            ));
        }
        fields.insert("table_number".into(), json!(table_number));
    }
    if let Some(number_of_guests) = patch.number_of_guests {
        if number_of_guests <= 0 {
            return Err(ApiError::bad_request_msg(
                "INVALID_TABLE",
                "number_of_guests must be positive",
            ));
        }
        fields.insert("number_of_guests".into(), json!(number_of_guests));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("table_id", table_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::TABLES,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("TABLE_NOT_FOUND"));
    }

    fetch_table(&state, &table_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TABLE_NOT_FOUND"))
}

async fn fetch_table(state: &AppState, table_id: &str) -> Result<Option<Table>, ApiError> {
    let filter = Filter::new().eq("table_id", table_id);
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::TABLES, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}
