//! Repository for the `task_locks` table (PRD-34).
//!
//! Lease correctness under concurrent multi-process dispatch rests on one
//! primitive: `SELECT ... FOR UPDATE SKIP LOCKED` on the task row. A
//! transaction that finds the row mid-claim by someone else must not
//! block — blocking would serialize dispatch globally — so it reports
//! benign contention and the caller moves to its next candidate.

use labelq_core::overlap::{self, CapacityCheck};
use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::task_lock::TaskLock;

/// Column list for `task_locks` queries.
const COLUMNS: &str = "id, task_id, user_id, expire_at, created_at";

/// Outcome of a claim attempt. Only [`ClaimOutcome::granted`] results
/// entitle the worker to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A new lease was created for this worker.
    Claimed,
    /// The worker already holds a live lease; ownership confirmed, the
    /// lease timing is left untouched.
    AlreadyHeld,
    /// Another transaction is mid-claim on this task row. Benign; try the
    /// next candidate.
    Contended,
    /// No lease capacity left (live leases plus finished annotations have
    /// reached the task's overlap).
    Saturated,
}

impl ClaimOutcome {
    /// Whether the worker may be handed the task.
    pub fn granted(self) -> bool {
        matches!(self, Self::Claimed | Self::AlreadyHeld)
    }
}

/// Provides lease lifecycle operations for task locks.
pub struct LockRepo;

impl LockRepo {
    /// Atomically claim `task_id` for `user_id`.
    ///
    /// One transaction: take the task row with `FOR UPDATE SKIP LOCKED`
    /// (skip means another claim is in flight — return
    /// [`ClaimOutcome::Contended`] without blocking), reap expired leases,
    /// confirm existing ownership, then enforce
    /// `active_leases + finished < overlap` before inserting a lease that
    /// expires after `ttl`.
    ///
    /// `cancelled_counts` is the project's skip-queue-policy decision on
    /// whether cancelled annotations consume overlap slots.
    /// `extra_capacity` widens the cap beyond the task's overlap; it is
    /// zero everywhere except low-agreement resurfacing, which adds
    /// annotators to a done task up to its configured headroom.
    pub async fn try_claim(
        pool: &PgPool,
        task_id: DbId,
        user_id: DbId,
        ttl: chrono::Duration,
        cancelled_counts: bool,
        extra_capacity: i32,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let gate: Option<(i32,)> =
            sqlx::query_as("SELECT overlap FROM tasks WHERE id = $1 FOR UPDATE SKIP LOCKED")
                .bind(task_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((overlap,)) = gate else {
            // Row locked by a concurrent claim (or task deleted under us).
            tx.rollback().await?;
            return Ok(ClaimOutcome::Contended);
        };

        // Reap expired leases while we hold the row.
        sqlx::query("DELETE FROM task_locks WHERE task_id = $1 AND expire_at <= NOW()")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        let own: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM task_locks WHERE task_id = $1 AND user_id = $2")
                .bind(task_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if own.is_some() {
            // Commit to keep the reap.
            tx.commit().await?;
            return Ok(ClaimOutcome::AlreadyHeld);
        }

        let active_locks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM task_locks WHERE task_id = $1")
                .bind(task_id)
                .fetch_one(&mut *tx)
                .await?;
        let finished: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM annotations \
             WHERE task_id = $1 AND NOT ground_truth AND (NOT was_cancelled OR $2)",
        )
        .bind(task_id)
        .bind(cancelled_counts)
        .fetch_one(&mut *tx)
        .await?;

        match overlap::check_capacity(active_locks, finished, overlap + extra_capacity) {
            CapacityCheck::Open { .. } => {
                sqlx::query(
                    "INSERT INTO task_locks (task_id, user_id, expire_at) \
                     VALUES ($1, $2, NOW() + make_interval(secs => $3))",
                )
                .bind(task_id)
                .bind(user_id)
                .bind(ttl.num_seconds() as f64)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(ClaimOutcome::Claimed)
            }
            CapacityCheck::Saturated => {
                tx.commit().await?;
                Ok(ClaimOutcome::Saturated)
            }
            CapacityCheck::Violated {
                active_locks,
                finished,
                overlap,
            } => {
                // Data is already inconsistent; refuse the lease and keep
                // serving rather than abort the request.
                tracing::error!(
                    task_id,
                    active_locks,
                    finished,
                    overlap,
                    "Task overlap capacity exceeded; refusing new lease",
                );
                tx.commit().await?;
                Ok(ClaimOutcome::Saturated)
            }
        }
    }

    /// Delete `user_id`'s lease on `task_id`, or every lease when
    /// `user_id` is `None` (annotation submitted, task withdrawn).
    /// Expired leases on the task are purged as a housekeeping side
    /// effect. Safe to call repeatedly.
    pub async fn release(
        pool: &PgPool,
        task_id: DbId,
        user_id: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        match user_id {
            Some(uid) => {
                sqlx::query(
                    "DELETE FROM task_locks \
                     WHERE task_id = $1 AND (user_id = $2 OR expire_at <= NOW())",
                )
                .bind(task_id)
                .bind(uid)
                .execute(pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM task_locks WHERE task_id = $1")
                    .bind(task_id)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// The task the worker currently holds a live lease on within the
    /// project, if any. Oldest lease first for a stable answer when data
    /// is unexpectedly plural.
    pub async fn find_active_for_worker(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT l.task_id FROM task_locks l \
             JOIN tasks t ON t.id = l.task_id \
             WHERE l.user_id = $1 AND t.project_id = $2 AND l.expire_at > NOW() \
             ORDER BY l.created_at ASC \
             LIMIT 1",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    /// List a task's live leases, oldest first. Diagnostic surface for
    /// admin tooling; dispatch itself only counts.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Vec<TaskLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM task_locks \
             WHERE task_id = $1 AND expire_at > NOW() \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, TaskLock>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Number of live leases on a task.
    pub async fn active_count(pool: &PgPool, task_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_locks WHERE task_id = $1 AND expire_at > NOW()",
        )
        .bind(task_id)
        .fetch_one(pool)
        .await
    }

    /// Whether the task is saturated: live leases plus finished
    /// annotations (per the owning project's skip queue policy) at or
    /// above its overlap. `None` when the task does not exist.
    pub async fn is_saturated(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT ( \
                 (SELECT COUNT(*) FROM task_locks l \
                  WHERE l.task_id = t.id AND l.expire_at > NOW()) \
               + (SELECT COUNT(*) FROM annotations a \
                  WHERE a.task_id = t.id \
                    AND NOT a.ground_truth \
                    AND (NOT a.was_cancelled OR p.skip_queue_policy = 'ignore')) \
             ) >= t.overlap \
             FROM tasks t \
             JOIN projects p ON p.id = t.project_id \
             WHERE t.id = $1",
        )
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }
}
