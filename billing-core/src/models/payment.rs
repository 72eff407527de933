use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment model.
///
/// A standalone record of money received from a client. It does not
/// reference which invoices it settled; settlement is inferred by the
/// payment allocator at recording time and not stored as a relation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Unique identifier for the payment
    pub id: Uuid,

    /// Client the money came from
    pub client_id: Uuid,

    /// Amount received
    pub amount: Decimal,

    /// Date the payment was made
    pub payment_date: DateTime<Utc>,

    /// Payment method (bank transfer, UPI, ...)
    pub payment_method: String,

    /// External transaction reference
    pub transaction_id: Option<String>,

    /// Free-form notes
    pub notes: Option<String>,

    /// Timestamp when the payment was recorded
    pub created_at: DateTime<Utc>,
}

/// Payment recording request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayment {
    pub client_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}
