//! Task lock (lease) entity model (PRD-34).

use labelq_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `task_locks` table.
///
/// A row whose `expire_at` has passed is treated as absent by every read
/// path; physical deletion happens opportunistically.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskLock {
    pub id: DbId,
    pub task_id: DbId,
    pub user_id: DbId,
    pub expire_at: Timestamp,
    pub created_at: Timestamp,
}
