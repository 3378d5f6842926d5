//! Repository for the `annotation_drafts` table (PRD-36).

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::draft::{AnnotationDraft, SaveDraft};

/// Column list for `annotation_drafts` queries.
const COLUMNS: &str = "id, task_id, user_id, result, was_postponed, created_at, updated_at";

/// Provides CRUD operations for annotation drafts.
pub struct DraftRepo;

impl DraftRepo {
    /// Save (upsert) a worker's draft for a task.
    ///
    /// Re-saving clears `was_postponed`: the worker is actively editing
    /// again, so the task no longer belongs to the postponed queue.
    pub async fn save(
        pool: &PgPool,
        task_id: DbId,
        user_id: DbId,
        input: &SaveDraft,
    ) -> Result<AnnotationDraft, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotation_drafts (task_id, user_id, result) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (task_id, user_id) \
             DO UPDATE SET result = EXCLUDED.result, \
                           was_postponed = FALSE, \
                           updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationDraft>(&query)
            .bind(task_id)
            .bind(user_id)
            .bind(&input.result)
            .fetch_one(pool)
            .await
    }

    /// Mark a worker's draft as postponed ("do this later").
    ///
    /// Returns `false` when no draft exists.
    pub async fn postpone(
        pool: &PgPool,
        task_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE annotation_drafts \
             SET was_postponed = TRUE, updated_at = NOW() \
             WHERE task_id = $1 AND user_id = $2",
        )
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a worker's draft for a task.
    pub async fn find(
        pool: &PgPool,
        task_id: DbId,
        user_id: DbId,
    ) -> Result<Option<AnnotationDraft>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM annotation_drafts WHERE task_id = $1 AND user_id = $2");
        sqlx::query_as::<_, AnnotationDraft>(&query)
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
