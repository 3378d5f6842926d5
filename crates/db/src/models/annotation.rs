//! Annotation entity model and DTOs (PRD-33).

use labelq_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `annotations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Annotation {
    pub id: DbId,
    pub task_id: DbId,
    pub completed_by: DbId,
    pub result: serde_json::Value,
    /// True for an explicit skip; whether a skip consumes an overlap slot
    /// depends on the project's skip queue policy.
    pub was_cancelled: bool,
    /// Reference answers; exempt from the overlap cap.
    pub ground_truth: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting an annotation.
#[derive(Debug, Deserialize)]
pub struct SubmitAnnotation {
    pub result: serde_json::Value,
    pub ground_truth: Option<bool>,
}
