use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::billing::pricing::resolve_price;
use crate::billing::selector::{select_billable, TaskFilter};
use crate::billing::{fetch_client, lock_client};
use crate::error::BillingError;
use crate::models::task::TaskStatus;

/// Absorbs floating-point noise in stored rates when comparing a task
/// price against the remaining discount.
fn epsilon() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// A priced candidate task in the discount walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub task_id: Uuid,
    pub price: Decimal,
}

/// Discount request payload.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDiscount {
    pub client_id: Uuid,
    pub amount: Decimal,
}

/// Outcome of a discount application.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResult {
    pub applied_task_ids: Vec<Uuid>,
    pub remaining_discount: Decimal,
}

/// Walks candidate tasks oldest-first and picks the ones the discount
/// can absorb.
///
/// This is a best-fit scan, not a strict prefix: a task whose price
/// exceeds the remaining amount is skipped but the walk continues, so a
/// later cheaper task can still be discounted. Unpriced (zero) tasks
/// are never selected. The walk ends once the remainder is exhausted.
pub fn plan_discount(candidates: &[Candidate], amount: Decimal) -> (Vec<Uuid>, Decimal) {
    let mut remaining = amount;
    let mut applied = Vec::new();
    for candidate in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        if candidate.price > Decimal::ZERO && candidate.price <= remaining + epsilon() {
            applied.push(candidate.task_id);
            remaining -= candidate.price;
        }
    }
    (applied, remaining)
}

/// Applies a flat discount amount against a client's oldest unbilled
/// billable tasks, marking the chosen tasks DISCOUNTED.
///
/// DISCOUNTED is terminal: the tasks leave the billable pool for good.
/// Tasks the scan skipped keep their DONE status and remain billable.
pub async fn apply_discount(
    pool: &PgPool,
    request: ApplyDiscount,
) -> Result<DiscountResult, BillingError> {
    if request.amount <= Decimal::ZERO {
        return Err(BillingError::Validation(
            "discount amount must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    lock_client(&mut tx, request.client_id).await?;

    let client = fetch_client(&mut *tx, request.client_id)
        .await?
        .ok_or(BillingError::NotFound("client"))?;

    // Oldest work first so the discount consumes the longest-waiting tasks
    let mut filter = TaskFilter::billable(request.client_id).oldest_first();
    filter.scheduled_only = false;
    let tasks = select_billable(&mut *tx, &filter).await?;

    let candidates: Vec<Candidate> = tasks
        .iter()
        .map(|task| Candidate {
            task_id: task.id,
            price: resolve_price(&client, &task.service_type),
        })
        .collect();
    let (applied, remaining) = plan_discount(&candidates, request.amount);

    if !applied.is_empty() {
        sqlx::query("UPDATE tasks SET status = $2 WHERE id = ANY($1)")
            .bind(&applied)
            .bind(TaskStatus::Discounted)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(
        "Applied discount of {} for client {}: {} task(s) marked DISCOUNTED, {} remaining",
        request.amount,
        request.client_id,
        applied.len(),
        remaining
    );

    Ok(DiscountResult {
        applied_task_ids: applied,
        remaining_discount: remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn candidate(price: &str) -> Candidate {
        Candidate {
            task_id: Uuid::new_v4(),
            price: dec(price),
        }
    }

    #[test]
    fn test_discount_consumes_oldest_until_exhausted() {
        // Three 500-rated tasks against 1200: two fit, the third (500)
        // exceeds the remaining 200 + epsilon
        let tasks = vec![candidate("500"), candidate("500"), candidate("500")];
        let (applied, remaining) = plan_discount(&tasks, dec("1200"));
        assert_eq!(applied, vec![tasks[0].task_id, tasks[1].task_id]);
        assert_eq!(remaining, dec("200"));
    }

    #[test]
    fn test_best_fit_scan_reaches_later_cheaper_task() {
        // The 400 task is skipped but the walk continues to the 100 task
        let tasks = vec![candidate("300"), candidate("400"), candidate("100")];
        let (applied, remaining) = plan_discount(&tasks, dec("450"));
        assert_eq!(applied, vec![tasks[0].task_id, tasks[2].task_id]);
        assert_eq!(remaining, dec("50"));
    }

    #[test]
    fn test_epsilon_absorbs_rounding() {
        let tasks = vec![candidate("100.005")];
        let (applied, remaining) = plan_discount(&tasks, dec("100"));
        assert_eq!(applied, vec![tasks[0].task_id]);
        assert_eq!(remaining, dec("-0.005"));
    }

    #[test]
    fn test_zero_priced_tasks_never_selected() {
        let tasks = vec![candidate("0"), candidate("50")];
        let (applied, remaining) = plan_discount(&tasks, dec("60"));
        assert_eq!(applied, vec![tasks[1].task_id]);
        assert_eq!(remaining, dec("10"));
    }

    #[test]
    fn test_walk_stops_once_remainder_is_spent() {
        let tasks = vec![candidate("50"), candidate("50"), candidate("50")];
        let (applied, remaining) = plan_discount(&tasks, dec("100"));
        assert_eq!(applied.len(), 2);
        assert_eq!(remaining, Decimal::ZERO);
    }
}
