pub mod builder;
pub mod discount;
pub mod handlers;
pub mod lifecycle;
pub mod numbering;
pub mod payment;
pub mod pending;
pub mod pricing;
pub mod selector;

#[cfg(test)]
mod tests;

pub use builder::{create_manual, generate_custom, generate_monthly};
pub use discount::apply_discount;
pub use payment::record_payment;
pub use pending::pending_amounts;

use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

use crate::models::client::Client;

/// Serializes every billing mutation for one client.
///
/// Takes a transaction-scoped Postgres advisory lock keyed on the
/// client id, released automatically at commit or rollback. Without it
/// the read-check-write sequences here (numbering, task selection,
/// payment and discount allocation) can interleave and double-bill a
/// task or double-allocate a payment.
pub(crate) async fn lock_client(
    tx: &mut Transaction<'_, Postgres>,
    client_id: Uuid,
) -> Result<(), sqlx::Error> {
    let (hi, _) = client_id.as_u64_pair();
    let key = hi as i64;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_client<'e, E>(
    executor: E,
    client_id: Uuid,
) -> Result<Option<Client>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Client>(
        r#"
        SELECT id, name, email, phone, address,
               poster_design_price, video_editing_price, ai_video_price,
               document_editing_price, other_work_price
        FROM clients WHERE id = $1
        "#,
    )
    .bind(client_id)
    .fetch_optional(executor)
    .await
}
