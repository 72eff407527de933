use sqlx::{Postgres, Transaction};

/// Computes the next sequential invoice number from the most recently
/// created invoice's number and the total invoice count.
///
/// Numbers have the form `INV-NNNNN` (5-digit, zero-padded). With no
/// prior invoice this returns `INV-00001`. If the last number does not
/// match the pattern, falls back to `INV-<count+1>`.
///
/// This scheme is not safe under concurrent creation on its own; the
/// invoice builder relies on the unique constraint on `invoice_number`
/// and retries once on conflict.
pub fn next_invoice_number(last_number: Option<&str>, count: i64) -> String {
    if let Some(last) = last_number {
        if let Some(digits) = last.strip_prefix("INV-") {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = digits.parse::<u64>() {
                    return format!("INV-{:05}", n + 1);
                }
            }
        }
        // Unparsable number on record, fall back to the row count
        format!("INV-{:05}", count + 1)
    } else {
        "INV-00001".to_string()
    }
}

/// Reads the numbering inputs inside the caller's transaction and
/// produces the next invoice number.
pub async fn allocate_number(tx: &mut Transaction<'_, Postgres>) -> Result<String, sqlx::Error> {
    let last: Option<String> = sqlx::query_scalar(
        "SELECT invoice_number FROM invoices ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(&mut **tx)
    .await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
        .fetch_one(&mut **tx)
        .await?;

    Ok(next_invoice_number(last.as_deref(), count))
}
