//! Dispatch orchestrator: the precedence tier chain (PRD-40).
//!
//! One dispatch request walks the tiers in a fixed order and returns at
//! the first tier that yields a task:
//!
//! 1. explicit assignment (no new lease)
//! 2. continuity — a task the worker already holds a lease on (no new lease)
//! 3. low-agreement resurfacing, least agreement first
//! 4. ground-truth tasks
//! 5. breadth-first — partially annotated tasks, most-covered first
//! 6. overlap-first — configured sampler over tasks with overlap > 1
//! 7. configured sampler over all candidates
//! 8. the worker's postponed drafts, oldest first (no new lease)
//! 9. the worker's skipped tasks, oldest first (requeue policy only)
//!
//! Claiming tiers walk an ordered candidate window and take the first
//! task whose claim is granted. A window where every claim is lost to
//! concurrent workers is refreshed once before the tier is abandoned, so
//! a single lost race never spuriously skips a whole tier.

use labelq_core::agreement;
use labelq_core::overlap;
use labelq_core::policy::{ProjectPolicy, SkipQueuePolicy, WorkerRole};
use labelq_core::types::DbId;
use labelq_db::repositories::{LockRepo, ProjectRepo, TaskRepo};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::PgPool;

use crate::candidates::{self, CandidateCtx};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::lock::LockManager;
use crate::strategy;
use crate::trace::{SelectionTrace, Tier};

/// One dispatch request. Worker identity and role come from the external
/// identity collaborator; this engine treats them as opaque.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub project_id: DbId,
    pub worker: DbId,
    pub role: WorkerRole,
    /// Pre-assigned task to return directly, when the caller carries an
    /// out-of-band assignment. Ignored unless the task is actually
    /// assigned to this worker in this project.
    pub assigned_task: Option<DbId>,
}

/// A successful dispatch result.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedTask {
    pub task_id: DbId,
    /// The tier that produced the task.
    pub tier: Tier,
    /// False when the task came back from the worker's own postponed
    /// queue: the client must not auto-postpone it again this turn.
    pub allow_postpone: bool,
    /// Human-readable breadcrumb of consulted tiers; observability only.
    pub trace: String,
}

/// The dispatch engine. Stateless between requests; owns an injected
/// connection pool whose lifecycle belongs to the hosting service.
pub struct Dispatcher {
    pool: PgPool,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, DispatchConfig::default())
    }

    pub fn with_config(pool: PgPool, config: DispatchConfig) -> Self {
        Self { pool, config }
    }

    /// Hand the worker its next task, or `None` when nothing is left to
    /// label right now.
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<Option<DispatchedTask>, DispatchError> {
        let project = ProjectRepo::find_by_id(&self.pool, request.project_id)
            .await?
            .ok_or(DispatchError::UnknownProject(request.project_id))?;
        let policy = project.policy()?;
        let lock = LockManager::for_policy(&policy);
        let mut trace = SelectionTrace::new();

        // 1. Explicit assignment. Returned without a new lease so the
        // assignment's own timing is preserved.
        if let Some(task_id) = request.assigned_task {
            trace.consulted(Tier::Assigned);
            if TaskRepo::find_assigned(&self.pool, task_id, request.project_id, request.worker)
                .await?
                .is_some()
            {
                return Ok(Some(self.win(task_id, Tier::Assigned, true, trace, request)));
            }
        }

        // 2. Continuity: a worker re-requesting before submitting gets
        // the same task back without lease churn.
        trace.consulted(Tier::Continuity);
        if let Some(task_id) =
            LockRepo::find_active_for_worker(&self.pool, request.project_id, request.worker)
                .await?
        {
            return Ok(Some(self.win(task_id, Tier::Continuity, true, trace, request)));
        }

        let ctx = CandidateCtx {
            project_id: request.project_id,
            worker: request.worker,
            cancelled_counts: policy.cancelled_counts_as_finished(),
            overlap_only: false,
        };

        // 3. Low-agreement resurfacing; annotator role only.
        if policy.agreement_threshold.is_some() && request.role == WorkerRole::Annotator {
            trace.consulted(Tier::LowAgreement);
            if let Some(task_id) = self
                .claim_tier(Tier::LowAgreement, &ctx, &policy, &lock)
                .await?
            {
                return Ok(Some(self.win(task_id, Tier::LowAgreement, true, trace, request)));
            }
        }

        // 4. Ground-truth tasks.
        if policy.show_ground_truth_first {
            trace.consulted(Tier::GroundTruth);
            if let Some(task_id) = self
                .claim_tier(Tier::GroundTruth, &ctx, &policy, &lock)
                .await?
            {
                return Ok(Some(self.win(task_id, Tier::GroundTruth, true, trace, request)));
            }
        }

        // 5. Breadth-first: finish partially annotated tasks before
        // starting fresh ones. Only meaningful with overlap above one.
        if policy.maximum_annotations > 1 {
            trace.consulted(Tier::BreadthFirst);
            if let Some(task_id) = self
                .claim_tier(Tier::BreadthFirst, &ctx, &policy, &lock)
                .await?
            {
                return Ok(Some(self.win(task_id, Tier::BreadthFirst, true, trace, request)));
            }
        }

        // 6. Overlap-first: the configured sampler, restricted to tasks
        // needing more than one annotator.
        if policy.show_overlap_first {
            trace.consulted(Tier::OverlapFirst);
            let restricted = CandidateCtx {
                overlap_only: true,
                ..ctx
            };
            if let Some(task_id) = self
                .claim_tier(Tier::OverlapFirst, &restricted, &policy, &lock)
                .await?
            {
                return Ok(Some(self.win(task_id, Tier::OverlapFirst, true, trace, request)));
            }
        }

        // 7. The configured sampler over the full candidate set.
        trace.consulted(Tier::Sampling);
        if let Some(task_id) = self.claim_tier(Tier::Sampling, &ctx, &policy, &lock).await? {
            return Ok(Some(self.win(task_id, Tier::Sampling, true, trace, request)));
        }

        // 8. The worker's own postponed drafts, oldest first. Worker-
        // scoped work, so no lease is taken; the result is flagged so the
        // client does not auto-postpone it straight back.
        trace.consulted(Tier::Postponed);
        if let Some(task_id) =
            candidates::next_postponed(&self.pool, request.project_id, request.worker).await?
        {
            return Ok(Some(self.win(task_id, Tier::Postponed, false, trace, request)));
        }

        // 9. Skip queue: re-offer previously skipped tasks to the same
        // worker, oldest first.
        if policy.skip_queue_policy == SkipQueuePolicy::RequeueForMe {
            trace.consulted(Tier::Skipped);
            if let Some(task_id) = self.claim_tier(Tier::Skipped, &ctx, &policy, &lock).await? {
                return Ok(Some(self.win(task_id, Tier::Skipped, true, trace, request)));
            }
        }

        tracing::debug!(
            project_id = request.project_id,
            worker = request.worker,
            trace = %trace.render(),
            "No tasks remaining",
        );
        Ok(None)
    }

    /// Release `worker`'s lease on a task (all leases when `None`).
    /// Called by the annotation-submission collaborator; idempotent.
    pub async fn release(
        &self,
        task_id: DbId,
        worker: Option<DbId>,
    ) -> Result<(), DispatchError> {
        LockManager::release(&self.pool, task_id, worker).await?;
        Ok(())
    }

    /// Read-only done predicate for reporting/export collaborators.
    pub async fn is_task_done(&self, task_id: DbId) -> Result<bool, DispatchError> {
        Ok(TaskRepo::is_done(&self.pool, task_id).await?.unwrap_or(false))
    }

    /// Read-only saturation predicate: whether leases plus finished
    /// annotations currently exhaust the task's overlap.
    pub async fn is_task_locked(&self, task_id: DbId) -> Result<bool, DispatchError> {
        Ok(LockRepo::is_saturated(&self.pool, task_id)
            .await?
            .unwrap_or(false))
    }

    // -----------------------------------------------------------------------
    // Tier plumbing
    // -----------------------------------------------------------------------

    /// Walk a tier's claim window; first granted claim wins. When every
    /// claim in a non-empty window is lost to concurrent workers, the
    /// window is refreshed once before the tier gives up.
    async fn claim_tier(
        &self,
        tier: Tier,
        ctx: &CandidateCtx,
        policy: &ProjectPolicy,
        lock: &LockManager,
    ) -> Result<Option<DbId>, DispatchError> {
        for refreshed in [false, true] {
            let window = self.fetch_window(tier, ctx, policy).await?;
            if window.is_empty() {
                return Ok(None);
            }
            for task_id in &window {
                let outcome = if tier == Tier::LowAgreement {
                    lock.try_claim_with_headroom(
                        &self.pool,
                        *task_id,
                        ctx.worker,
                        policy.max_additional_annotators,
                    )
                    .await?
                } else {
                    lock.try_claim(&self.pool, *task_id, ctx.worker).await?
                };
                if outcome.granted() {
                    return Ok(Some(*task_id));
                }
            }
            if !refreshed {
                tracing::debug!(
                    tier = tier.as_str(),
                    window = window.len(),
                    "Whole claim window lost to concurrent workers; refreshing once",
                );
            }
        }
        Ok(None)
    }

    /// Produce the ordered candidate window for a claiming tier.
    async fn fetch_window(
        &self,
        tier: Tier,
        ctx: &CandidateCtx,
        policy: &ProjectPolicy,
    ) -> Result<Vec<DbId>, DispatchError> {
        let window = match tier {
            Tier::LowAgreement => self.low_agreement_window(ctx, policy).await?,
            Tier::GroundTruth => {
                candidates::ground_truth_window(&self.pool, ctx, self.config.sample_window).await?
            }
            Tier::BreadthFirst => {
                let mut ids =
                    candidates::breadth_first_window(&self.pool, ctx, self.config.sample_window)
                        .await?;
                // The returned ids are tied at the maximum coverage;
                // random order spreads concurrent workers across them.
                ids.shuffle(&mut rand::rng());
                ids
            }
            Tier::OverlapFirst | Tier::Sampling => {
                strategy::sampling_window(&self.pool, ctx, policy, &self.config).await?
            }
            Tier::Skipped => {
                candidates::skipped_window(
                    &self.pool,
                    ctx.project_id,
                    ctx.worker,
                    self.config.sample_window,
                )
                .await?
            }
            // Not claim-window tiers.
            Tier::Assigned | Tier::Continuity | Tier::Postponed => Vec::new(),
        };
        Ok(window)
    }

    /// Score done tasks for low-agreement resurfacing and order them
    /// least-agreed first.
    async fn low_agreement_window(
        &self,
        ctx: &CandidateCtx,
        policy: &ProjectPolicy,
    ) -> Result<Vec<DbId>, DispatchError> {
        let Some(threshold) = policy.agreement_threshold else {
            return Ok(Vec::new());
        };

        let rows =
            candidates::low_agreement_rows(&self.pool, ctx, policy.max_additional_annotators)
                .await?;

        // Rows arrive grouped by task id; score each task's result set.
        let mut scored: Vec<(DbId, f64)> = Vec::new();
        let mut current: Option<(DbId, Vec<serde_json::Value>)> = None;
        for (task_id, result) in rows {
            match &mut current {
                Some((id, results)) if *id == task_id => results.push(result),
                _ => {
                    flush_low_agreement(&mut scored, current.take(), threshold);
                    current = Some((task_id, vec![result]));
                }
            }
        }
        flush_low_agreement(&mut scored, current.take(), threshold);

        overlap::rank_by_agreement(&mut scored);
        scored.truncate(self.config.sample_window as usize);
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }

    fn win(
        &self,
        task_id: DbId,
        tier: Tier,
        allow_postpone: bool,
        mut trace: SelectionTrace,
        request: &DispatchRequest,
    ) -> DispatchedTask {
        trace.won(tier);
        let rendered = trace.render();
        tracing::info!(
            project_id = request.project_id,
            worker = request.worker,
            task_id,
            tier = tier.as_str(),
            trace = %rendered,
            "Task dispatched",
        );
        DispatchedTask {
            task_id,
            tier,
            allow_postpone,
            trace: rendered,
        }
    }
}

/// Append a task to the scored list when its agreement is defined and
/// under the threshold.
fn flush_low_agreement(
    scored: &mut Vec<(DbId, f64)>,
    group: Option<(DbId, Vec<serde_json::Value>)>,
    threshold: f64,
) {
    let Some((task_id, results)) = group else {
        return;
    };
    let score = agreement::agreement_score(&results);
    if agreement::is_low_agreement(score, threshold) {
        // is_low_agreement guarantees Some here.
        if let Some(score) = score {
            scored.push((task_id, score));
        }
    }
}
