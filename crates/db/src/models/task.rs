//! Task entity model and DTOs (PRD-32).

use labelq_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub project_id: DbId,
    /// Required distinct-annotator count before the task is done.
    pub overlap: i32,
    /// Derived; recomputed on every annotation mutation.
    pub is_done: bool,
    /// Out-of-band explicit assignment; overrides the done filter for
    /// exactly this worker.
    pub assignee_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a task via the import collaborator.
#[derive(Debug, Deserialize)]
pub struct CreateTask {
    /// Defaults to the project's `maximum_annotations` when omitted.
    pub overlap: Option<i32>,
    pub assignee_id: Option<DbId>,
}
