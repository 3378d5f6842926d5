//! Annotation draft entity model and DTOs (PRD-36).

use labelq_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `annotation_drafts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotationDraft {
    pub id: DbId,
    pub task_id: DbId,
    pub user_id: DbId,
    pub result: serde_json::Value,
    /// Set when the worker explicitly deferred the task; postponed drafts
    /// are resurfaced by dispatch, oldest first.
    pub was_postponed: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for saving (upserting) a draft.
#[derive(Debug, Deserialize)]
pub struct SaveDraft {
    pub result: serde_json::Value,
}
