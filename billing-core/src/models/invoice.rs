use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Invoice status enumeration.
///
/// Lifecycle: created DRAFT, flipped to SENT the first time the invoice
/// document is produced, flipped to PAID by the payment allocator.
/// OVERDUE is also a computed label for unpaid invoices past their due
/// date; see `billing::lifecycle::effective_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum InvoiceStatus {
    #[sqlx(rename = "DRAFT")]
    #[serde(rename = "DRAFT")]
    Draft,
    #[sqlx(rename = "SENT")]
    #[serde(rename = "SENT")]
    Sent,
    #[sqlx(rename = "PAID")]
    #[serde(rename = "PAID")]
    Paid,
    #[sqlx(rename = "OVERDUE")]
    #[serde(rename = "OVERDUE")]
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "DRAFT"),
            InvoiceStatus::Sent => write!(f, "SENT"),
            InvoiceStatus::Paid => write!(f, "PAID"),
            InvoiceStatus::Overdue => write!(f, "OVERDUE"),
        }
    }
}

/// Invoice model.
///
/// Maps to the `invoices` table. The monetary fields are fixed at
/// creation time and satisfy `total = subtotal + tax_amount - discount`;
/// they are never recomputed because items are immutable post-creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: Uuid,

    /// Human-readable sequential number of the form INV-NNNNN
    pub invoice_number: String,

    /// Owning client
    pub client_id: Uuid,

    /// Stored lifecycle status
    pub status: InvoiceStatus,

    /// Due date for payment
    pub due_date: DateTime<Utc>,

    /// Sum of item amounts
    pub subtotal: Decimal,

    /// Tax rate in percent
    pub tax_rate: Decimal,

    /// Derived tax amount (subtotal * tax_rate / 100)
    pub tax_amount: Decimal,

    /// Flat discount subtracted once from the total
    pub discount: Decimal,

    /// Grand total: subtotal + tax_amount - discount
    pub total: Decimal,

    /// Free-form notes rendered on the invoice document
    pub notes: Option<String>,

    /// Timestamp when the invoice was created
    pub created_at: DateTime<Utc>,
}

/// Invoice line item.
///
/// Owned exclusively by one invoice, created atomically with it and
/// never mutated independently. `amount = quantity * unit_price`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Line item payload for manual invoice creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Manual invoice creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub status: Option<InvoiceStatus>,
    pub items: Vec<NewInvoiceItem>,
    pub notes: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub discount: Option<Decimal>,
}

/// Direct status override request.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInvoiceStatus {
    pub status: InvoiceStatus,
}

/// Invoice with its items and client embedded, as returned by the list
/// and download endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub client: crate::models::client::Client,
}
