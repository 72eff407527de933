use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::billing::numbering::allocate_number;
use crate::billing::pricing::resolve_price;
use crate::billing::selector::{select_billable, TaskFilter};
use crate::billing::{fetch_client, lock_client};
use crate::error::BillingError;
use crate::models::client::Client;
use crate::models::invoice::{CreateInvoice, Invoice, InvoiceItem, InvoiceStatus, NewInvoiceItem};
use crate::models::task::BillableTask;

/// Generated invoices fall due two weeks after creation.
const DUE_DAYS: i64 = 14;

/// Monetary totals computed at invoice creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Computes invoice totals from line items.
///
/// `subtotal = Σ(quantity × unit_price)`,
/// `tax_amount = subtotal × tax_rate / 100`,
/// `total = subtotal + tax_amount − discount`. The invariant holds at
/// creation time and is never recomputed afterward.
pub fn compute_totals(items: &[NewInvoiceItem], tax_rate: Decimal, discount: Decimal) -> Totals {
    let subtotal: Decimal = items
        .iter()
        .map(|item| Decimal::from(item.quantity) * item.unit_price)
        .sum();
    let tax_amount = subtotal * tax_rate / Decimal::from(100);
    Totals {
        subtotal,
        tax_amount,
        total: subtotal + tax_amount - discount,
    }
}

/// Validates a manual invoice request: a non-empty item list, positive
/// integer quantities, non-negative prices, non-negative tax rate and
/// discount.
pub fn validate_manual(request: &CreateInvoice) -> Result<(), BillingError> {
    if request.items.is_empty() {
        return Err(BillingError::Validation(
            "invoice requires at least one item".to_string(),
        ));
    }
    for item in &request.items {
        if item.description.trim().is_empty() {
            return Err(BillingError::Validation(
                "item description must not be empty".to_string(),
            ));
        }
        if item.quantity <= 0 {
            return Err(BillingError::Validation(
                "item quantity must be positive".to_string(),
            ));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(BillingError::Validation(
                "item unit price must not be negative".to_string(),
            ));
        }
    }
    if request.tax_rate.unwrap_or(Decimal::ZERO) < Decimal::ZERO {
        return Err(BillingError::Validation(
            "tax rate must not be negative".to_string(),
        ));
    }
    if request.discount.unwrap_or(Decimal::ZERO) < Decimal::ZERO {
        return Err(BillingError::Validation(
            "discount must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Formats a generated line description: service type, task title and
/// the formatted scheduled date.
pub fn line_description(service_type: &str, title: &str, scheduled: DateTime<Utc>) -> String {
    format!(
        "{} - {} ({})",
        service_type,
        title,
        scheduled.format("%d/%m/%Y")
    )
}

/// Result of one generated invoice: the persisted invoice, its items and
/// the ids of the tasks it consumed.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedInvoice {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub consumed_task_ids: Vec<Uuid>,
}

/// Creates an invoice from caller-supplied line items (manual mode).
///
/// Consumes no tasks. The invoice and its items are persisted in one
/// transaction under the client's advisory lock; a duplicate invoice
/// number is retried once with a freshly allocated number.
pub async fn create_manual(
    pool: &PgPool,
    request: CreateInvoice,
    now: DateTime<Utc>,
) -> Result<(Invoice, Vec<InvoiceItem>), BillingError> {
    validate_manual(&request)?;

    match create_manual_once(pool, &request, now).await {
        Err(e) if is_number_conflict(&e) => {
            tracing::warn!("Invoice number collision, retrying once");
            create_manual_once(pool, &request, now)
                .await
                .map_err(promote_conflict)
        }
        other => other,
    }
}

async fn create_manual_once(
    pool: &PgPool,
    request: &CreateInvoice,
    now: DateTime<Utc>,
) -> Result<(Invoice, Vec<InvoiceItem>), BillingError> {
    let tax_rate = request.tax_rate.unwrap_or(Decimal::ZERO);
    let discount = request.discount.unwrap_or(Decimal::ZERO);
    let totals = compute_totals(&request.items, tax_rate, discount);
    let status = request.status.unwrap_or(InvoiceStatus::Draft);

    let mut tx = pool.begin().await?;
    lock_client(&mut tx, request.client_id).await?;

    fetch_client(&mut *tx, request.client_id)
        .await?
        .ok_or(BillingError::NotFound("client"))?;

    let number = allocate_number(&mut tx).await?;
    let invoice = insert_invoice(
        &mut tx,
        &number,
        request.client_id,
        status,
        request.due_date,
        totals,
        tax_rate,
        discount,
        request.notes.as_deref(),
        now,
    )
    .await?;
    let items = insert_items(&mut tx, invoice.id, &request.items).await?;

    tx.commit().await?;
    info!(
        "Created manual invoice {} for client {} (total {})",
        invoice.invoice_number, invoice.client_id, invoice.total
    );
    Ok((invoice, items))
}

/// Generates invoices for a batch of clients from their unbilled DONE
/// tasks (monthly mode). Clients with no priced billable work are
/// silently skipped. Each client is processed in its own transaction.
pub async fn generate_monthly(
    pool: &PgPool,
    client_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<Vec<GeneratedInvoice>, BillingError> {
    let mut generated = Vec::new();
    for &client_id in client_ids {
        if let Some(invoice) = generate_for_client(pool, client_id, None, now).await? {
            generated.push(invoice);
        }
    }
    info!("Monthly generation produced {} invoice(s)", generated.len());
    Ok(generated)
}

/// Generates a single invoice for one client from DONE tasks scheduled
/// within `[from, to]`, with `to` extended to the end of its day.
///
/// Unlike monthly mode this is a single-client operation, so an empty
/// selection is reported: no tasks in range is `NoBillableTasks`, tasks
/// found but none priced is `NoPricedTasks`.
pub async fn generate_custom(
    pool: &PgPool,
    client_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<GeneratedInvoice, BillingError> {
    let range = (day_start(from), day_end(to));
    match generate_for_client(pool, client_id, Some(range), now).await? {
        Some(invoice) => Ok(invoice),
        None => Err(BillingError::NoBillableTasks),
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59.999, matching the inclusive upper bound used in selection
    day_start(date) + Duration::days(1) - Duration::milliseconds(1)
}

/// Generates one invoice for one client inside a single transaction.
///
/// Returns `Ok(None)` when no tasks were selected; raises
/// `NoPricedTasks` when tasks exist but none has a configured price and
/// the caller supplied a date range (the single-client custom path).
async fn generate_for_client(
    pool: &PgPool,
    client_id: Uuid,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> Result<Option<GeneratedInvoice>, BillingError> {
    match generate_for_client_once(pool, client_id, range, now).await {
        Err(e) if is_number_conflict(&e) => {
            tracing::warn!("Invoice number collision, retrying once");
            generate_for_client_once(pool, client_id, range, now)
                .await
                .map_err(promote_conflict)
        }
        other => other,
    }
}

async fn generate_for_client_once(
    pool: &PgPool,
    client_id: Uuid,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> Result<Option<GeneratedInvoice>, BillingError> {
    let mut tx = pool.begin().await?;
    lock_client(&mut tx, client_id).await?;

    let Some(client) = fetch_client(&mut *tx, client_id).await? else {
        return if range.is_some() {
            Err(BillingError::NotFound("client"))
        } else {
            Ok(None)
        };
    };

    let mut filter = TaskFilter::billable(client_id).oldest_first();
    if let Some((from, to)) = range {
        filter = filter.between(from, to);
    }
    let tasks = select_billable(&mut *tx, &filter).await?;
    if tasks.is_empty() {
        tx.rollback().await?;
        return Ok(None);
    }

    let (items, consumed) = price_tasks(&client, &tasks);
    if items.is_empty() {
        // Tasks exist but none carries a billable price
        tx.rollback().await?;
        return if range.is_some() {
            Err(BillingError::NoPricedTasks)
        } else {
            Ok(None)
        };
    }

    let totals = compute_totals(&items, Decimal::ZERO, Decimal::ZERO);
    let number = allocate_number(&mut tx).await?;
    let invoice = insert_invoice(
        &mut tx,
        &number,
        client_id,
        InvoiceStatus::Draft,
        now + Duration::days(DUE_DAYS),
        totals,
        Decimal::ZERO,
        Decimal::ZERO,
        None,
        now,
    )
    .await?;
    let items = insert_items(&mut tx, invoice.id, &items).await?;
    link_tasks(&mut tx, invoice.id, &consumed).await?;

    tx.commit().await?;
    info!(
        "Generated invoice {} for client {} from {} task(s)",
        invoice.invoice_number,
        client_id,
        consumed.len()
    );
    Ok(Some(GeneratedInvoice {
        invoice,
        items,
        consumed_task_ids: consumed,
    }))
}

/// Resolves a price for each selected task and builds one line per
/// priced task. Zero-priced tasks are skipped entirely: they neither
/// appear on the invoice nor get linked to it, so they stay billable.
fn price_tasks(client: &Client, tasks: &[BillableTask]) -> (Vec<NewInvoiceItem>, Vec<Uuid>) {
    let mut items = Vec::new();
    let mut consumed = Vec::new();
    for task in tasks {
        let price = resolve_price(client, &task.service_type);
        if price <= Decimal::ZERO {
            continue;
        }
        let scheduled = task.scheduled_date.unwrap_or_default();
        items.push(NewInvoiceItem {
            description: line_description(&task.service_type, &task.title, scheduled),
            quantity: 1,
            unit_price: price,
        });
        consumed.push(task.id);
    }
    (items, consumed)
}

/// True when the error is the unique-constraint violation raised by a
/// concurrent creation allocating the same invoice number. The builder
/// retries such a failure exactly once with a freshly read number; a
/// second collision surfaces as `NumberConflict`.
fn is_number_conflict(error: &BillingError) -> bool {
    match error {
        BillingError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

fn promote_conflict(error: BillingError) -> BillingError {
    if is_number_conflict(&error) {
        BillingError::NumberConflict
    } else {
        error
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_invoice(
    tx: &mut Transaction<'_, Postgres>,
    number: &str,
    client_id: Uuid,
    status: InvoiceStatus,
    due_date: DateTime<Utc>,
    totals: Totals,
    tax_rate: Decimal,
    discount: Decimal,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Invoice, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            id, invoice_number, client_id, status, due_date,
            subtotal, tax_rate, tax_amount, discount, total, notes, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, invoice_number, client_id, status, due_date,
                  subtotal, tax_rate, tax_amount, discount, total, notes, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(number)
    .bind(client_id)
    .bind(status)
    .bind(due_date)
    .bind(totals.subtotal)
    .bind(tax_rate)
    .bind(totals.tax_amount)
    .bind(discount)
    .bind(totals.total)
    .bind(notes)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    items: &[NewInvoiceItem],
) -> Result<Vec<InvoiceItem>, sqlx::Error> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let amount = Decimal::from(item.quantity) * item.unit_price;
        let row = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, invoice_id, description, quantity, unit_price, amount
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

/// Sets `invoice_id` on every consumed task. The `invoice_id IS NULL`
/// guard re-asserts the no-double-billing invariant at write time.
async fn link_tasks(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    task_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET invoice_id = $1 WHERE id = ANY($2) AND invoice_id IS NULL")
        .bind(invoice_id)
        .bind(task_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
