use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::billing::builder::{create_manual, generate_custom, generate_monthly};
use crate::billing::discount::{apply_discount, ApplyDiscount};
use crate::billing::lifecycle::{delete_invoice, list_invoices, prepare_download, set_status};
use crate::billing::payment::record_payment;
use crate::billing::pending::pending_amounts;
use crate::error::BillingError;
use crate::models::invoice::{CreateInvoice, UpdateInvoiceStatus};
use crate::models::payment::RecordPayment;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    /// Restrict the listing to one client's invoices
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMonthlyRequest {
    pub client_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCustomRequest {
    pub client_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// GET /invoices
pub async fn list_invoices_handler(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Value>, BillingError> {
    let invoices = list_invoices(&state.db, query.client_id, Utc::now()).await?;
    Ok(Json(json!(invoices)))
}

/// POST /invoices
pub async fn create_invoice_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<Value>), BillingError> {
    let (invoice, items) = create_manual(&state.db, request, Utc::now()).await?;
    let mut body = json!(invoice);
    body["items"] = json!(items);
    Ok((StatusCode::CREATED, Json(body)))
}

/// PUT /invoices/:id/status
pub async fn update_status_handler(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceStatus>,
) -> Result<Json<Value>, BillingError> {
    let invoice = set_status(&state.db, invoice_id, request.status).await?;
    Ok(Json(json!(invoice)))
}

/// GET /invoices/:id/download
///
/// Flips a DRAFT invoice to SENT, then returns the document payload
/// (invoice, items, client) for the external PDF renderer.
pub async fn download_invoice_handler(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, BillingError> {
    let detail = prepare_download(&state.db, invoice_id).await?;
    Ok(Json(json!(detail)))
}

/// GET /invoices/pending-amounts
pub async fn pending_amounts_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, BillingError> {
    let rollup = pending_amounts(&state.db).await?;
    Ok(Json(json!(rollup)))
}

/// POST /invoices/payment
pub async fn record_payment_handler(
    State(state): State<AppState>,
    Json(request): Json<RecordPayment>,
) -> Result<Json<Value>, BillingError> {
    let result = record_payment(&state.db, request, Utc::now()).await?;
    let mut body = json!(result);
    body["message"] = json!("Payment recorded");
    Ok(Json(body))
}

/// POST /invoices/discount
pub async fn apply_discount_handler(
    State(state): State<AppState>,
    Json(request): Json<ApplyDiscount>,
) -> Result<Json<Value>, BillingError> {
    let result = apply_discount(&state.db, request).await?;
    let mut body = json!(result);
    body["message"] = json!("Discount applied");
    Ok(Json(body))
}

/// POST /invoices/generate-monthly
pub async fn generate_monthly_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateMonthlyRequest>,
) -> Result<Json<Value>, BillingError> {
    info!(
        "Monthly invoice generation requested for {} client(s)",
        request.client_ids.len()
    );
    let generated = generate_monthly(&state.db, &request.client_ids, Utc::now()).await?;
    Ok(Json(json!({
        "generated": generated.len(),
        "invoices": generated,
    })))
}

/// POST /invoices/generate-custom
pub async fn generate_custom_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateCustomRequest>,
) -> Result<(StatusCode, Json<Value>), BillingError> {
    if request.to_date < request.from_date {
        return Err(BillingError::Validation(
            "toDate must not precede fromDate".to_string(),
        ));
    }
    let generated = generate_custom(
        &state.db,
        request.client_id,
        request.from_date,
        request.to_date,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!(generated))))
}

/// DELETE /invoices/:id
pub async fn delete_invoice_handler(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, BillingError> {
    delete_invoice(&state.db, invoice_id).await?;
    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}
