use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::billing::fetch_client;
use crate::error::BillingError;
use crate::models::invoice::{Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus};
use crate::models::task::Task;

/// Computes the status an invoice should be reported with.
///
/// OVERDUE is a derived label, not a scheduled transition: an unpaid
/// invoice whose due date has passed is reported OVERDUE wherever
/// invoices are listed, while its stored status is left alone.
pub fn effective_status(
    stored: InvoiceStatus,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> InvoiceStatus {
    match stored {
        InvoiceStatus::Paid => InvoiceStatus::Paid,
        _ if due_date < now => InvoiceStatus::Overdue,
        status => status,
    }
}

/// Lists invoices newest-first with items and client embedded,
/// optionally restricted to one client. Statuses are reported through
/// `effective_status`.
pub async fn list_invoices(
    pool: &PgPool,
    client_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Vec<InvoiceDetail>, BillingError> {
    let invoices = match client_id {
        Some(client_id) => {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT id, invoice_number, client_id, status, due_date,
                       subtotal, tax_rate, tax_amount, discount, total, notes, created_at
                FROM invoices WHERE client_id = $1 ORDER BY created_at DESC
                "#,
            )
            .bind(client_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT id, invoice_number, client_id, status, due_date,
                       subtotal, tax_rate, tax_amount, discount, total, notes, created_at
                FROM invoices ORDER BY created_at DESC
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    let mut details = Vec::with_capacity(invoices.len());
    for mut invoice in invoices {
        invoice.status = effective_status(invoice.status, invoice.due_date, now);
        let items = fetch_items(pool, invoice.id).await?;
        let client = fetch_client(pool, invoice.client_id)
            .await?
            .ok_or(BillingError::NotFound("client"))?;
        details.push(InvoiceDetail {
            invoice,
            items,
            client,
        });
    }
    Ok(details)
}

/// Fetches the invoice document payload for download, transitioning
/// DRAFT to SENT the first time. Re-downloading a SENT/PAID invoice is
/// a no-op on status, so the transition is idempotent.
pub async fn prepare_download(
    pool: &PgPool,
    invoice_id: Uuid,
) -> Result<InvoiceDetail, BillingError> {
    let mut tx = pool.begin().await?;

    let Some(mut invoice) = fetch_invoice(&mut *tx, invoice_id).await? else {
        return Err(BillingError::NotFound("invoice"));
    };

    if invoice.status == InvoiceStatus::Draft {
        invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $2
            WHERE id = $1
            RETURNING id, invoice_number, client_id, status, due_date,
                      subtotal, tax_rate, tax_amount, discount, total, notes, created_at
            "#,
        )
        .bind(invoice_id)
        .bind(InvoiceStatus::Sent)
        .fetch_one(&mut *tx)
        .await?;
        info!("Invoice {} marked SENT on first download", invoice.invoice_number);
    }

    let items = fetch_items(&mut *tx, invoice_id).await?;
    let client = fetch_client(&mut *tx, invoice.client_id)
        .await?
        .ok_or(BillingError::NotFound("client"))?;

    tx.commit().await?;
    Ok(InvoiceDetail {
        invoice,
        items,
        client,
    })
}

/// Overrides an invoice's stored status directly. Deliberately not
/// validated against the DRAFT → SENT → PAID transitions; callers may
/// set any status.
pub async fn set_status(
    pool: &PgPool,
    invoice_id: Uuid,
    status: InvoiceStatus,
) -> Result<Invoice, BillingError> {
    let updated = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices SET status = $2
        WHERE id = $1
        RETURNING id, invoice_number, client_id, status, due_date,
                  subtotal, tax_rate, tax_amount, discount, total, notes, created_at
        "#,
    )
    .bind(invoice_id)
    .bind(status)
    .fetch_optional(pool)
    .await?
    .ok_or(BillingError::NotFound("invoice"))?;
    Ok(updated)
}

/// Deletes an invoice and its items, returning the tasks it consumed to
/// the billable pool by clearing their `invoice_id`.
///
/// Task statuses are untouched: unlinked tasks stay DONE, and tasks
/// previously DISCOUNTED by an unrelated discount operation stay
/// DISCOUNTED. Payment records are never reversed.
pub async fn delete_invoice(pool: &PgPool, invoice_id: Uuid) -> Result<(), BillingError> {
    let mut tx = pool.begin().await?;

    if fetch_invoice(&mut *tx, invoice_id).await?.is_none() {
        return Err(BillingError::NotFound("invoice"));
    }

    let linked = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, title, status, service_type, scheduled_date,
               client_id, project_id, invoice_id
        FROM tasks WHERE invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *tx)
    .await?;

    if !linked.is_empty() {
        sqlx::query("UPDATE tasks SET invoice_id = NULL WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
    }

    // invoice_items rows go with the invoice via ON DELETE CASCADE
    sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(
        "Deleted invoice {} and returned {} tasks to the billable pool",
        invoice_id,
        linked.len()
    );
    Ok(())
}

async fn fetch_invoice<'e, E>(executor: E, invoice_id: Uuid) -> Result<Option<Invoice>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, invoice_number, client_id, status, due_date,
               subtotal, tax_rate, tax_amount, discount, total, notes, created_at
        FROM invoices WHERE id = $1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(executor)
    .await
}

async fn fetch_items<'e, E>(executor: E, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, description, quantity, unit_price, amount
        FROM invoice_items WHERE invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .fetch_all(executor)
    .await
}
