//! Repository for the `annotations` table (PRD-33).
//!
//! Every mutation runs in one transaction together with the derived-state
//! bookkeeping it invalidates: `tasks.is_done` is recomputed, and a
//! submission releases the submitting worker's lease so the overlap slot
//! converts from lease to finished annotation without a window where both
//! are counted.

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::annotation::{Annotation, SubmitAnnotation};
use crate::repositories::task_repo::TaskRepo;

/// Column list for `annotations` queries.
const COLUMNS: &str = "\
    id, task_id, completed_by, result, was_cancelled, ground_truth, \
    created_at, updated_at";

/// Provides CRUD operations for annotations.
pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Submit a finished annotation.
    ///
    /// Inserts the row, drops any draft the worker had on the task,
    /// recomputes `is_done`, and releases the worker's lease (plus any
    /// expired leases on the task).
    pub async fn submit(
        pool: &PgPool,
        task_id: DbId,
        completed_by: DbId,
        input: &SubmitAnnotation,
    ) -> Result<Annotation, sqlx::Error> {
        Self::insert(pool, task_id, completed_by, &input.result, false, input.ground_truth.unwrap_or(false)).await
    }

    /// Record an explicit skip.
    ///
    /// Same bookkeeping as a submission; whether the skip consumes an
    /// overlap slot is decided at read time by the project's skip queue
    /// policy.
    pub async fn skip(
        pool: &PgPool,
        task_id: DbId,
        completed_by: DbId,
        result: serde_json::Value,
    ) -> Result<Annotation, sqlx::Error> {
        Self::insert(pool, task_id, completed_by, &result, true, false).await
    }

    async fn insert(
        pool: &PgPool,
        task_id: DbId,
        completed_by: DbId,
        result: &serde_json::Value,
        was_cancelled: bool,
        ground_truth: bool,
    ) -> Result<Annotation, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO annotations \
                 (task_id, completed_by, result, was_cancelled, ground_truth) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let annotation = sqlx::query_as::<_, Annotation>(&query)
            .bind(task_id)
            .bind(completed_by)
            .bind(result)
            .bind(was_cancelled)
            .bind(ground_truth)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM annotation_drafts WHERE task_id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(completed_by)
            .execute(&mut *tx)
            .await?;

        TaskRepo::recompute_is_done(&mut *tx, task_id).await?;

        sqlx::query(
            "DELETE FROM task_locks \
             WHERE task_id = $1 AND (user_id = $2 OR expire_at <= NOW())",
        )
        .bind(task_id)
        .bind(completed_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(annotation)
    }

    /// Replace an annotation's result payload.
    pub async fn update_result(
        pool: &PgPool,
        annotation_id: DbId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task_id: Option<DbId> = sqlx::query_scalar(
            "UPDATE annotations SET result = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING task_id",
        )
        .bind(annotation_id)
        .bind(result)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(task_id) = task_id else {
            tx.rollback().await?;
            return Ok(false);
        };
        TaskRepo::recompute_is_done(&mut *tx, task_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Delete an annotation and recompute the task's done flag.
    ///
    /// Returns `false` when the annotation did not exist.
    pub async fn delete(pool: &PgPool, annotation_id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task_id: Option<DbId> =
            sqlx::query_scalar("DELETE FROM annotations WHERE id = $1 RETURNING task_id")
                .bind(annotation_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(task_id) = task_id else {
            tx.rollback().await?;
            return Ok(false);
        };
        TaskRepo::recompute_is_done(&mut *tx, task_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// List a task's annotations, oldest first.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM annotations WHERE task_id = $1 ORDER BY created_at ASC");
        sqlx::query_as::<_, Annotation>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }
}
