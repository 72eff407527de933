use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Task status enumeration.
///
/// TODO/IN_PROGRESS/REVIEW/DONE are workflow states; DISCOUNTED is a
/// terminal billing-exclusion state set by the discount allocator. A
/// DISCOUNTED task is never selected for invoicing again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum TaskStatus {
    #[sqlx(rename = "TODO")]
    #[serde(rename = "TODO")]
    Todo,
    #[sqlx(rename = "IN_PROGRESS")]
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[sqlx(rename = "REVIEW")]
    #[serde(rename = "REVIEW")]
    Review,
    #[sqlx(rename = "DONE")]
    #[serde(rename = "DONE")]
    Done,
    #[sqlx(rename = "DISCOUNTED")]
    #[serde(rename = "DISCOUNTED")]
    Discounted,
}

/// Task model as seen by the billing core.
///
/// Maps to the `tasks` table. A task references its owning client either
/// directly (`client_id`) or through its project; the selector resolves
/// the effective client in SQL so both paths share one code path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    pub id: Uuid,

    /// Task title (embedded in generated invoice line descriptions)
    pub title: String,

    /// Workflow / billing status
    pub status: TaskStatus,

    /// Service label, one of the five known types (NULL = not billable)
    pub service_type: Option<String>,

    /// Date the work was scheduled for
    pub scheduled_date: Option<DateTime<Utc>>,

    /// Direct client reference
    pub client_id: Option<Uuid>,

    /// Indirect client reference via project
    pub project_id: Option<Uuid>,

    /// Set exactly once when the task is consumed into an invoice
    pub invoice_id: Option<Uuid>,
}

/// A task joined with its resolved effective client, as returned by the
/// billable-task selector. `client_id` here is always the effective one
/// (`COALESCE(task.client_id, project.client_id)`).
#[derive(Debug, Clone, FromRow)]
pub struct BillableTask {
    pub id: Uuid,
    pub title: String,
    pub service_type: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub client_id: Uuid,
}
