//! Dispatch error taxonomy (PRD-40).
//!
//! Only two conditions cross the subsystem boundary as errors: a missing
//! or misconfigured project, and storage failures. "No tasks remaining"
//! is `Ok(None)` from dispatch, and lost claim races are absorbed by the
//! orchestrator's same-tier retry.

use labelq_core::error::CoreError;
use labelq_core::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Project not found: {0}")]
    UnknownProject(DbId),

    /// A project row carried an unparseable or out-of-range policy.
    #[error("Invalid project policy: {0}")]
    Policy(#[from] CoreError),

    /// Transient storage failure; propagated untouched. Retries, if any,
    /// belong to the calling request layer.
    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}
