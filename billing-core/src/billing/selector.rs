use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::task::{BillableTask, TaskStatus};

/// Predicate for selecting tasks eligible for billing.
///
/// Every query produced from this filter requires `invoice_id IS NULL`
/// (a task is billed at most once) and a non-null `service_type`. The
/// effective client is resolved in SQL as
/// `COALESCE(task.client_id, project.client_id)`; tasks whose effective
/// client cannot be resolved are excluded by the WHERE clause rather
/// than reported as errors.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Restrict to a single effective client
    pub client_id: Option<Uuid>,

    /// Acceptable task statuses
    pub statuses: Vec<TaskStatus>,

    /// Require a scheduled date (generation embeds it in descriptions)
    pub scheduled_only: bool,

    /// Inclusive lower bound on scheduled_date
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on scheduled_date (callers adjust to end of day)
    pub to: Option<DateTime<Utc>>,

    /// Order ascending by scheduled_date (oldest work first)
    pub oldest_first: bool,
}

impl TaskFilter {
    /// Filter for work ready to be invoiced for one client: DONE, typed,
    /// scheduled and not yet consumed by any invoice.
    pub fn billable(client_id: Uuid) -> Self {
        TaskFilter {
            client_id: Some(client_id),
            statuses: vec![TaskStatus::Done],
            scheduled_only: true,
            from: None,
            to: None,
            oldest_first: false,
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }
}

/// Selects tasks matching the filter, each joined with its resolved
/// effective client id.
pub async fn select_billable<'e, E>(
    executor: E,
    filter: &TaskFilter,
) -> Result<Vec<BillableTask>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT t.id, t.title, t.service_type, t.scheduled_date, \
         COALESCE(t.client_id, p.client_id) AS client_id \
         FROM tasks t \
         LEFT JOIN projects p ON t.project_id = p.id \
         WHERE t.invoice_id IS NULL \
         AND t.service_type IS NOT NULL \
         AND COALESCE(t.client_id, p.client_id) IS NOT NULL",
    );

    let statuses: Vec<String> = filter
        .statuses
        .iter()
        .map(|s| status_literal(*s).to_string())
        .collect();
    builder.push(" AND t.status = ANY(");
    builder.push_bind(statuses);
    builder.push(")");

    if let Some(client_id) = filter.client_id {
        builder.push(" AND COALESCE(t.client_id, p.client_id) = ");
        builder.push_bind(client_id);
    }

    if filter.scheduled_only {
        builder.push(" AND t.scheduled_date IS NOT NULL");
    }

    if let Some(from) = filter.from {
        builder.push(" AND t.scheduled_date >= ");
        builder.push_bind(from);
    }

    if let Some(to) = filter.to {
        builder.push(" AND t.scheduled_date <= ");
        builder.push_bind(to);
    }

    if filter.oldest_first {
        builder.push(" ORDER BY t.scheduled_date ASC");
    }

    builder
        .build_query_as::<BillableTask>()
        .fetch_all(executor)
        .await
}

fn status_literal(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "TODO",
        TaskStatus::InProgress => "IN_PROGRESS",
        TaskStatus::Review => "REVIEW",
        TaskStatus::Done => "DONE",
        TaskStatus::Discounted => "DISCOUNTED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billable_filter_defaults() {
        let client_id = Uuid::new_v4();
        let filter = TaskFilter::billable(client_id);
        assert_eq!(filter.client_id, Some(client_id));
        assert_eq!(filter.statuses, vec![TaskStatus::Done]);
        assert!(filter.scheduled_only);
        assert!(filter.from.is_none() && filter.to.is_none());
        assert!(!filter.oldest_first);
    }

    #[test]
    fn test_between_sets_both_bounds() {
        let from = "2024-01-01T00:00:00Z".parse().unwrap();
        let to = "2024-01-31T23:59:59Z".parse().unwrap();
        let filter = TaskFilter::billable(Uuid::new_v4()).between(from, to);
        assert_eq!(filter.from, Some(from));
        assert_eq!(filter.to, Some(to));
    }

    #[test]
    fn test_status_literals_match_stored_values() {
        assert_eq!(status_literal(TaskStatus::Done), "DONE");
        assert_eq!(status_literal(TaskStatus::Discounted), "DISCOUNTED");
        assert_eq!(status_literal(TaskStatus::InProgress), "IN_PROGRESS");
    }
}
