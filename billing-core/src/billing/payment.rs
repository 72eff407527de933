use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::billing::{fetch_client, lock_client};
use crate::error::BillingError;
use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::models::payment::{Payment, RecordPayment};

/// Outcome of recording a payment: the persisted payment record, the
/// invoices flipped to PAID, and any amount left unapplied.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub payment: Payment,
    pub updated_invoices: Vec<Invoice>,
    pub remaining_credit: Decimal,
}

/// A single outstanding obligation in the allocation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obligation {
    pub invoice_id: Uuid,
    pub total: Decimal,
}

/// Walks outstanding invoices oldest-first and decides which are fully
/// covered by the amount.
///
/// Allocation is all-or-nothing per invoice: an invoice is either fully
/// paid or left untouched. The walk stops at the first invoice the
/// remaining amount cannot cover, so payment always settles a strict
/// prefix of the debt list. Whatever is left over is unapplied credit.
pub fn plan_allocation(outstanding: &[Obligation], amount: Decimal) -> (Vec<Uuid>, Decimal) {
    let mut remaining = amount;
    let mut paid = Vec::new();
    for obligation in outstanding {
        if remaining < obligation.total {
            break;
        }
        paid.push(obligation.invoice_id);
        remaining -= obligation.total;
    }
    (paid, remaining)
}

/// Records a payment and greedily settles the client's oldest
/// outstanding invoices.
///
/// The payment record is persisted unconditionally, even when nothing
/// can be allocated. Unapplied credit is returned to the caller but not
/// stored anywhere.
pub async fn record_payment(
    pool: &PgPool,
    request: RecordPayment,
    now: DateTime<Utc>,
) -> Result<PaymentResult, BillingError> {
    if request.amount <= Decimal::ZERO {
        return Err(BillingError::Validation(
            "payment amount must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    lock_client(&mut tx, request.client_id).await?;

    fetch_client(&mut *tx, request.client_id)
        .await?
        .ok_or(BillingError::NotFound("client"))?;

    let payment = insert_payment(&mut tx, &request, now).await?;

    // Oldest debt first
    let outstanding = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, invoice_number, client_id, status, due_date,
               subtotal, tax_rate, tax_amount, discount, total, notes, created_at
        FROM invoices
        WHERE client_id = $1 AND status = ANY($2)
        ORDER BY created_at ASC
        "#,
    )
    .bind(request.client_id)
    .bind(vec!["SENT", "DRAFT", "OVERDUE"])
    .fetch_all(&mut *tx)
    .await?;

    let obligations: Vec<Obligation> = outstanding
        .iter()
        .map(|inv| Obligation {
            invoice_id: inv.id,
            total: inv.total,
        })
        .collect();
    let (paid_ids, remaining_credit) = plan_allocation(&obligations, request.amount);

    let mut updated_invoices = Vec::with_capacity(paid_ids.len());
    for invoice_id in &paid_ids {
        let updated = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $2
            WHERE id = $1
            RETURNING id, invoice_number, client_id, status, due_date,
                      subtotal, tax_rate, tax_amount, discount, total, notes, created_at
            "#,
        )
        .bind(invoice_id)
        .bind(InvoiceStatus::Paid)
        .fetch_one(&mut *tx)
        .await?;
        updated_invoices.push(updated);
    }

    tx.commit().await?;
    info!(
        "Recorded payment of {} for client {}: {} invoice(s) settled, {} unapplied",
        request.amount,
        request.client_id,
        updated_invoices.len(),
        remaining_credit
    );

    Ok(PaymentResult {
        payment,
        updated_invoices,
        remaining_credit,
    })
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    request: &RecordPayment,
    now: DateTime<Utc>,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, client_id, amount, payment_date, payment_method,
                              transaction_id, notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, client_id, amount, payment_date, payment_method,
                  transaction_id, notes, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(request.client_id)
    .bind(request.amount)
    .bind(request.payment_date)
    .bind(&request.payment_method)
    .bind(request.transaction_id.as_deref())
    .bind(request.notes.as_deref())
    .bind(now)
    .fetch_one(&mut **tx)
    .await
}
