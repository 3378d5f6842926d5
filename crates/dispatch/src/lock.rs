//! Policy-aware lease manager (PRD-41).
//!
//! Thin wrapper over `labelq_db`'s lock repository that carries the
//! per-request policy decisions: lease TTL, whether cancelled
//! annotations consume overlap slots, and the extra headroom granted to
//! low-agreement resurfacing. Keeping those here leaves the repository's
//! claim transaction policy-free.

use labelq_core::policy::ProjectPolicy;
use labelq_core::types::DbId;
use labelq_db::repositories::{ClaimOutcome, LockRepo};
use sqlx::PgPool;

/// Lease decisions for one dispatch request.
#[derive(Debug, Clone)]
pub struct LockManager {
    ttl: chrono::Duration,
    cancelled_counts: bool,
}

impl LockManager {
    /// Build a manager from the request's policy snapshot.
    pub fn for_policy(policy: &ProjectPolicy) -> Self {
        Self {
            ttl: policy.lease_ttl,
            cancelled_counts: policy.cancelled_counts_as_finished(),
        }
    }

    /// Atomically claim `task_id` for `worker`. Never blocks on benign
    /// contention; see [`LockRepo::try_claim`].
    pub async fn try_claim(
        &self,
        pool: &PgPool,
        task_id: DbId,
        worker: DbId,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        LockRepo::try_claim(pool, task_id, worker, self.ttl, self.cancelled_counts, 0).await
    }

    /// Claim with extra capacity beyond the task's overlap.
    ///
    /// Used only by the low-agreement queue, which deliberately adds
    /// annotators to a done task up to
    /// `overlap + max_additional_annotators`.
    pub async fn try_claim_with_headroom(
        &self,
        pool: &PgPool,
        task_id: DbId,
        worker: DbId,
        headroom: i32,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        LockRepo::try_claim(pool, task_id, worker, self.ttl, self.cancelled_counts, headroom).await
    }

    /// Release `worker`'s lease on `task_id` (all leases when `None`).
    pub async fn release(
        pool: &PgPool,
        task_id: DbId,
        worker: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        LockRepo::release(pool, task_id, worker).await
    }
}
