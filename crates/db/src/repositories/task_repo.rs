//! Repository for the `tasks` table (PRD-32).
//!
//! `is_done` is derived state: only [`TaskRepo::recompute_is_done`] writes
//! it, and the annotation repository calls that inside the same
//! transaction as every annotation mutation.

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::task::{CreateTask, Task};

/// Column list for `tasks` queries.
const COLUMNS: &str = "id, project_id, overlap, is_done, assignee_id, created_at, updated_at";

/// Provides CRUD operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Create a new task. Overlap defaults to the project's
    /// `maximum_annotations` when the import did not specify one.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateTask,
    ) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (project_id, overlap, assignee_id) \
             VALUES ($1, \
                     COALESCE($2, (SELECT maximum_annotations FROM projects WHERE id = $1)), \
                     $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .bind(input.overlap)
            .bind(input.assignee_id)
            .fetch_one(pool)
            .await
    }

    /// Find a task by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a task only if it is explicitly assigned to `worker` within
    /// `project_id`. Used by the assignment dispatch tier, which bypasses
    /// the done filter.
    pub async fn find_assigned(
        pool: &PgPool,
        task_id: DbId,
        project_id: DbId,
        worker: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE id = $1 AND project_id = $2 AND assignee_id = $3"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(project_id)
            .bind(worker)
            .fetch_optional(pool)
            .await
    }

    /// Set or clear a task's out-of-band assignment.
    pub async fn assign(
        pool: &PgPool,
        task_id: DbId,
        worker: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET assignee_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(task_id)
        .bind(worker)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Read the derived done flag. `None` when the task does not exist.
    pub async fn is_done(pool: &PgPool, task_id: DbId) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar("SELECT is_done FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// Recompute `is_done` from finished annotation counts.
    ///
    /// "Finished" excludes ground truth always, and excludes cancelled
    /// annotations unless the project's skip queue policy is `ignore`.
    /// Returns the new flag, or `None` when the task does not exist.
    ///
    /// Takes any Postgres executor so the annotation repository can run it
    /// inside the same transaction as the mutation that invalidated it.
    pub async fn recompute_is_done<'e, E>(
        executor: E,
        task_id: DbId,
    ) -> Result<Option<bool>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_scalar(
            "UPDATE tasks t \
             SET is_done = ( \
                     SELECT COUNT(*) FROM annotations a \
                     WHERE a.task_id = t.id \
                       AND NOT a.ground_truth \
                       AND (NOT a.was_cancelled OR p.skip_queue_policy = 'ignore') \
                 ) >= t.overlap, \
                 updated_at = NOW() \
             FROM projects p \
             WHERE t.id = $1 AND p.id = t.project_id \
             RETURNING t.is_done",
        )
        .bind(task_id)
        .fetch_optional(executor)
        .await
    }
}
