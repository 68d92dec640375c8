use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::billing::BillingLine;
use crate::models::{collections, new_id, Invoice};
use crate::order_handlers::fetch_order;
use crate::paging::PageParams;
use crate::store::{from_document, to_document, with_timeout, Filter, LOOKUP_TIMEOUT};
use crate::AppState;

const PAYMENT_METHODS: &[&str] = &["CARD", "CASH"];
const PAYMENT_STATUSES: &[&str] = &["PENDING", "PAID"];
const DEFAULT_DUE_HOURS: i64 = 1;

#[derive(Deserialize)]
pub struct NewInvoice {
    pub order_id: String,
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
    pub payment_due_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct InvoicePatch {
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
}

/// Invoice enriched with the billing view of its order.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub invoice_id: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_due: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i64>,
    pub order_items: Vec<BillingLine>,
}

pub async fn create_invoice(
    _auth: AuthContext,
    State(state): State<AppState>,
    Json(request): Json<NewInvoice>,
) -> ApiResult<Json<Invoice>> {
    if fetch_order(&state, &request.order_id).await?.is_none() {
        return Err(ApiError::bad_request_msg(
            "ORDER_NOT_FOUND",
            "order was not found",
        ));
    }

    if let Some(method) = &request.payment_method {
        validate_choice("payment_method", method, PAYMENT_METHODS)?;
    }
    if let Some(status) = &request.payment_status {
        validate_choice("payment_status", status, PAYMENT_STATUSES)?;
    }

    let now = Utc::now();
    let invoice = Invoice {
        invoice_id: new_id(),
        order_id: request.order_id,
        payment_method: request.payment_method,
        payment_status: request
            .payment_status
            .or_else(|| Some("PENDING".to_string())),
        payment_due_date: request
            .payment_due_date
            .or_else(|| Some(now + Duration::hours(DEFAULT_DUE_HOURS))),
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&invoice)?;
    with_timeout(
        LOOKUP_TIMEOUT,
        state.store.insert_one(collections::INVOICES, doc),
    )
    .await?;

    info!(invoice_id = %invoice.invoice_id, order_id = %invoice.order_id, "Created invoice");
    Ok(Json(invoice))
}

pub async fn list_invoices(
    _auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let docs = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_many(collections::INVOICES, &Filter::new()),
    )
    .await?;

    let mut invoices = Vec::with_capacity(docs.len());
    for doc in docs {
        invoices.push(from_document::<Invoice>(doc)?);
    }

    Ok(Json(params.window().apply(invoices)))
}

/// An invoice read resolves the live billing view of its order, so the
/// amount due always reflects the current items rather than a snapshot.
pub async fn get_invoice(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Json<InvoiceView>> {
    let filter = Filter::new().eq("invoice_id", invoice_id.as_str());
    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::INVOICES, &filter),
    )
    .await?;

    let invoice: Invoice = match found {
        Some(doc) => from_document(doc)?,
        None => return Err(ApiError::not_found("INVOICE_NOT_FOUND")),
    };

    let summaries = match state.billing.items_by_order(&invoice.order_id).await {
        Ok(summaries) => summaries,
        Err(err) => {
            warn!(
                invoice_id = %invoice.invoice_id,
                order_id = %invoice.order_id,
                error = %err,
                "Billing aggregation failed for invoice"
            );
            return Err(err.into());
        }
    };

    let (payment_due, table_number, order_items) = match summaries.into_iter().next() {
        Some(summary) => (
            Some(summary.payment_due),
            summary.table_number,
            summary.order_items,
        ),
        None => (None, None, Vec::new()),
    };

    Ok(Json(InvoiceView {
        invoice_id: invoice.invoice_id,
        order_id: invoice.order_id,
        payment_method: invoice.payment_method,
        payment_status: invoice.payment_status,
        payment_due_date: invoice.payment_due_date,
        payment_due,
        table_number,
        order_items,
    }))
}

pub async fn update_invoice(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(patch): Json<InvoicePatch>,
) -> ApiResult<Json<Invoice>> {
    let mut fields = serde_json::Map::new();
    if let Some(method) = patch.payment_method {
        validate_choice("payment_method", &method, PAYMENT_METHODS)?;
        fields.insert("payment_method".into(), json!(method));
    }
    if let Some(status) = patch.payment_status {
        validate_choice("payment_status", &status, PAYMENT_STATUSES)?;
        fields.insert("payment_status".into(), json!(status));
    }
    fields.insert("updated_at".into(), json!(Utc::now()));

    let filter = Filter::new().eq("invoice_id", invoice_id.as_str());
    let outcome = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.update_one(
            collections::INVOICES,
            &filter,
            serde_json::Value::Object(fields),
            false,
        ),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(ApiError::not_found("INVOICE_NOT_FOUND"));
    }

    let found = with_timeout(
        LOOKUP_TIMEOUT,
        state.store.find_one(collections::INVOICES, &filter),
    )
    .await?;
    match found {
        Some(doc) => Ok(Json(from_document::<Invoice>(doc)?)),
        None => Err(ApiError::not_found("INVOICE_NOT_FOUND")),
    }
}

fn validate_choice(field: &str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ApiError::bad_request_msg(
            "INVALID_INVOICE",
            format!("Unsupported {field} '{value}'. Allowed: {}", allowed.join(", ")),
        ))
    }
}
