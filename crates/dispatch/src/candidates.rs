//! Candidate resolution: which tasks may be offered to a worker (PRD-42).
//!
//! Every tier works from the same eligibility rules, expressed as SQL
//! fragments shared across the window queries:
//! - the worker has not already submitted any annotation for the task;
//! - the worker holds no postponed draft on it (those resurface later,
//!   in the postponed tier);
//! - the task is not done, unless it is explicitly assigned to exactly
//!   this worker (assignment overrides the done filter).
//!
//! Claiming tiers additionally pre-filter saturated tasks: tasks whose
//! live foreign leases plus finished annotations already reach the
//! overlap. The pre-filter is advisory — the lock repository's claim
//! transaction is the authority — but it keeps windows from filling up
//! with tasks that cannot be granted.
//!
//! Bind-parameter convention for the window queries:
//! `$1` project, `$2` worker, `$3` cancelled-counts flag, `$4` limit.

use std::collections::HashMap;

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::strategy::UncertaintyCandidate;

/// Shared eligibility filter. Binds `$1` project, `$2` worker.
const ELIGIBLE: &str = "\
    t.project_id = $1 \
    AND NOT EXISTS (SELECT 1 FROM annotations a \
                    WHERE a.task_id = t.id AND a.completed_by = $2) \
    AND NOT EXISTS (SELECT 1 FROM annotation_drafts d \
                    WHERE d.task_id = t.id AND d.user_id = $2 AND d.was_postponed) \
    AND (NOT t.is_done OR t.assignee_id = $2)";

/// Saturation pre-filter: live leases held by other workers plus finished
/// annotations stay under the overlap. Binds `$2` worker, `$3`
/// cancelled-counts flag.
const UNSATURATED: &str = "\
    ((SELECT COUNT(*) FROM task_locks l \
      WHERE l.task_id = t.id AND l.expire_at > NOW() AND l.user_id <> $2) \
     + (SELECT COUNT(*) FROM annotations f \
        WHERE f.task_id = t.id AND NOT f.ground_truth \
          AND (NOT f.was_cancelled OR $3))) < t.overlap";

/// Query context shared by the window functions.
#[derive(Debug, Clone, Copy)]
pub struct CandidateCtx {
    pub project_id: DbId,
    pub worker: DbId,
    /// Whether cancelled annotations consume overlap slots.
    pub cancelled_counts: bool,
    /// Restrict candidates to tasks needing more than one annotator
    /// (overlap-first tier).
    pub overlap_only: bool,
}

impl CandidateCtx {
    fn overlap_clause(&self) -> &'static str {
        if self.overlap_only {
            " AND t.overlap > 1"
        } else {
            ""
        }
    }
}

/// Eligible, unsaturated candidates in ascending task-id order.
pub async fn sequential_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    limit: i64,
) -> Result<Vec<DbId>, sqlx::Error> {
    let query = format!(
        "SELECT t.id FROM tasks t \
         WHERE {ELIGIBLE} AND {UNSATURATED}{} \
         ORDER BY t.id ASC \
         LIMIT $4",
        ctx.overlap_clause()
    );
    sqlx::query_scalar(&query)
        .bind(ctx.project_id)
        .bind(ctx.worker)
        .bind(ctx.cancelled_counts)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Eligible, unsaturated candidates in random order, bounded by `limit`
/// so high-cardinality projects never pay a full-table shuffle per
/// dispatch.
pub async fn random_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    limit: i64,
) -> Result<Vec<DbId>, sqlx::Error> {
    let query = format!(
        "SELECT t.id FROM tasks t \
         WHERE {ELIGIBLE} AND {UNSATURATED}{} \
         ORDER BY RANDOM() \
         LIMIT $4",
        ctx.overlap_clause()
    );
    sqlx::query_scalar(&query)
        .bind(ctx.project_id)
        .bind(ctx.worker)
        .bind(ctx.cancelled_counts)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Candidates carrying a ground-truth annotation, ascending task id.
pub async fn ground_truth_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    limit: i64,
) -> Result<Vec<DbId>, sqlx::Error> {
    let query = format!(
        "SELECT t.id FROM tasks t \
         WHERE {ELIGIBLE} AND {UNSATURATED} \
           AND EXISTS (SELECT 1 FROM annotations g \
                       WHERE g.task_id = t.id AND g.ground_truth) \
         ORDER BY t.id ASC \
         LIMIT $4"
    );
    sqlx::query_scalar(&query)
        .bind(ctx.project_id)
        .bind(ctx.worker)
        .bind(ctx.cancelled_counts)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Candidates tied at the maximum finished-annotation count, provided
/// that maximum is above zero: the breadth-first queue pushes partially
/// annotated tasks toward completion before fresh ones are started.
/// The tie-break among the returned ids is up to the caller.
pub async fn breadth_first_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    limit: i64,
) -> Result<Vec<DbId>, sqlx::Error> {
    let query = format!(
        "WITH cand AS ( \
             SELECT t.id, \
                    (SELECT COUNT(*) FROM annotations b \
                     WHERE b.task_id = t.id AND NOT b.ground_truth \
                       AND (NOT b.was_cancelled OR $3)) AS finished \
             FROM tasks t \
             WHERE {ELIGIBLE} AND {UNSATURATED} \
         ) \
         SELECT id FROM cand \
         WHERE finished > 0 AND finished = (SELECT MAX(finished) FROM cand) \
         LIMIT $4"
    );
    sqlx::query_scalar(&query)
        .bind(ctx.project_id)
        .bind(ctx.worker)
        .bind(ctx.cancelled_counts)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Candidates carrying a prediction tagged with `model_version`, one row
/// per task with its most uncertain (lowest-score) prediction. The scan
/// is bounded; ordering happens in Rust where it can consult the
/// worker's per-cluster history.
pub async fn uncertainty_candidates(
    pool: &PgPool,
    ctx: &CandidateCtx,
    model_version: &str,
    scan_limit: i64,
) -> Result<Vec<UncertaintyCandidate>, sqlx::Error> {
    let query = format!(
        "SELECT DISTINCT ON (t.id) t.id, p.cluster, p.score \
         FROM tasks t \
         JOIN predictions p ON p.task_id = t.id AND p.model_version = $4 \
         WHERE {ELIGIBLE} AND {UNSATURATED}{} \
         ORDER BY t.id, p.score ASC \
         LIMIT $5",
        ctx.overlap_clause()
    );
    let rows: Vec<(DbId, Option<i32>, f64)> = sqlx::query_as(&query)
        .bind(ctx.project_id)
        .bind(ctx.worker)
        .bind(ctx.cancelled_counts)
        .bind(model_version)
        .bind(scan_limit)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(task_id, cluster, score)| UncertaintyCandidate {
            task_id,
            cluster,
            score,
        })
        .collect())
}

/// How many tasks per prediction cluster the worker has already finished
/// in this project, keyed by cluster (None = unclustered).
pub async fn solved_per_cluster(
    pool: &PgPool,
    project_id: DbId,
    worker: DbId,
    model_version: &str,
) -> Result<HashMap<Option<i32>, i64>, sqlx::Error> {
    let rows: Vec<(Option<i32>, i64)> = sqlx::query_as(
        "SELECT p.cluster, COUNT(DISTINCT a.task_id) \
         FROM annotations a \
         JOIN tasks t ON t.id = a.task_id \
         JOIN predictions p ON p.task_id = a.task_id AND p.model_version = $3 \
         WHERE t.project_id = $1 AND a.completed_by = $2 AND NOT a.was_cancelled \
         GROUP BY p.cluster",
    )
    .bind(project_id)
    .bind(worker)
    .bind(model_version)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Done tasks eligible for low-agreement resurfacing, with their finished
/// result payloads: not yet touched by this worker, and with annotator
/// headroom left (`distinct annotators < overlap + max_additional`).
/// Agreement scoring and ordering happen in Rust.
pub async fn low_agreement_rows(
    pool: &PgPool,
    ctx: &CandidateCtx,
    max_additional: i32,
) -> Result<Vec<(DbId, serde_json::Value)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.id, a.result \
         FROM tasks t \
         JOIN annotations a ON a.task_id = t.id \
              AND NOT a.ground_truth AND NOT a.was_cancelled \
         WHERE t.project_id = $1 AND t.is_done \
           AND NOT EXISTS (SELECT 1 FROM annotations own \
                           WHERE own.task_id = t.id AND own.completed_by = $2) \
           AND (SELECT COUNT(DISTINCT c.completed_by) FROM annotations c \
                WHERE c.task_id = t.id AND NOT c.ground_truth) < t.overlap + $3 \
         ORDER BY t.id, a.created_at ASC",
    )
    .bind(ctx.project_id)
    .bind(ctx.worker)
    .bind(max_additional)
    .fetch_all(pool)
    .await
}

/// The worker's oldest postponed draft whose task is still eligible.
pub async fn next_postponed(
    pool: &PgPool,
    project_id: DbId,
    worker: DbId,
) -> Result<Option<DbId>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT d.task_id \
         FROM annotation_drafts d \
         JOIN tasks t ON t.id = d.task_id \
         WHERE d.user_id = $2 AND d.was_postponed AND t.project_id = $1 \
           AND NOT EXISTS (SELECT 1 FROM annotations a \
                           WHERE a.task_id = t.id AND a.completed_by = $2) \
           AND (NOT t.is_done OR t.assignee_id = $2) \
         ORDER BY d.created_at ASC \
         LIMIT 1",
    )
    .bind(project_id)
    .bind(worker)
    .fetch_optional(pool)
    .await
}

/// Tasks the worker previously skipped and that are still not done,
/// oldest skip first. Only consulted under the requeue skip policy.
pub async fn skipped_window(
    pool: &PgPool,
    project_id: DbId,
    worker: DbId,
    limit: i64,
) -> Result<Vec<DbId>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT a.task_id \
         FROM annotations a \
         JOIN tasks t ON t.id = a.task_id \
         WHERE a.completed_by = $2 AND a.was_cancelled \
           AND t.project_id = $1 AND NOT t.is_done \
         ORDER BY a.created_at ASC \
         LIMIT $3",
    )
    .bind(project_id)
    .bind(worker)
    .bind(limit)
    .fetch_all(pool)
    .await
}
