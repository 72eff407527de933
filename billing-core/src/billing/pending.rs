use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::billing::pricing::resolve_price;
use crate::error::BillingError;
use crate::models::client::Client;
use crate::models::task::TaskStatus;

/// One unbilled task row feeding the pending-amounts projection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingTask {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service_type: String,
    pub status: TaskStatus,
}

/// Per-client rollup of unbilled work: `amount` is the value of DONE
/// tasks awaiting invoicing, `discounted` the value written off by the
/// discount allocator.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAmount {
    pub client: Client,
    pub amount: Decimal,
    pub discounted: Decimal,
    pub task_ids: Vec<Uuid>,
}

/// Groups unbilled tasks by client, pricing each against the client's
/// rate table. Zero-priced tasks are dropped from the rollup.
pub fn group_pending(clients: &HashMap<Uuid, Client>, tasks: &[PendingTask]) -> Vec<PendingAmount> {
    let mut grouped: HashMap<Uuid, PendingAmount> = HashMap::new();
    for task in tasks {
        let Some(client) = clients.get(&task.client_id) else {
            continue;
        };
        let price = resolve_price(client, &task.service_type);
        if price <= Decimal::ZERO {
            continue;
        }

        let entry = grouped
            .entry(task.client_id)
            .or_insert_with(|| PendingAmount {
                client: client.clone(),
                amount: Decimal::ZERO,
                discounted: Decimal::ZERO,
                task_ids: Vec::new(),
            });
        match task.status {
            TaskStatus::Done => entry.amount += price,
            TaskStatus::Discounted => entry.discounted += price,
            _ => {}
        }
        entry.task_ids.push(task.id);
    }

    let mut rollup: Vec<PendingAmount> = grouped.into_values().collect();
    rollup.sort_by(|a, b| a.client.name.cmp(&b.client.name));
    rollup
}

/// Read-only projection of unbilled DONE and DISCOUNTED work grouped by
/// effective client.
pub async fn pending_amounts(pool: &PgPool) -> Result<Vec<PendingAmount>, BillingError> {
    let tasks = sqlx::query_as::<_, PendingTask>(
        r#"
        SELECT t.id, COALESCE(t.client_id, p.client_id) AS client_id,
               t.service_type, t.status
        FROM tasks t
        LEFT JOIN projects p ON t.project_id = p.id
        WHERE t.invoice_id IS NULL
          AND t.service_type IS NOT NULL
          AND t.scheduled_date IS NOT NULL
          AND t.status = ANY($1)
          AND COALESCE(t.client_id, p.client_id) IS NOT NULL
        "#,
    )
    .bind(vec!["DONE", "DISCOUNTED"])
    .fetch_all(pool)
    .await?;

    let client_ids: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = tasks.iter().map(|t| t.client_id).collect();
        ids.sort();
        ids.dedup();
        ids
    };

    let clients: HashMap<Uuid, Client> = sqlx::query_as::<_, Client>(
        r#"
        SELECT id, name, email, phone, address,
               poster_design_price, video_editing_price, ai_video_price,
               document_editing_price, other_work_price
        FROM clients WHERE id = ANY($1)
        "#,
    )
    .bind(&client_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|c| (c.id, c))
    .collect();

    Ok(group_pending(&clients, &tasks))
}
