//! Overlap arithmetic for task redundancy bookkeeping (PRD-32).
//!
//! A task with `overlap = N` must receive N distinct non-ground-truth
//! annotators before it is done. Active leases and finished annotations
//! share those N slots; the sum may never exceed the overlap.

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Capacity check
// ---------------------------------------------------------------------------

/// Outcome of checking a task's lease capacity against its overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityCheck {
    /// Slots remain; a new lease may be created.
    Open { remaining: i64 },
    /// All slots are taken by live leases and finished annotations.
    Saturated,
    /// More slots consumed than exist. Data is already inconsistent;
    /// callers log this and treat the task as unavailable.
    Violated {
        active_locks: i64,
        finished: i64,
        overlap: i32,
    },
}

/// Check whether a task has lease capacity left.
///
/// `active_locks` counts non-expired leases held by workers other than
/// the prospective claimer; `finished` counts annotations per the
/// project's skip queue policy, excluding ground truth.
pub fn check_capacity(active_locks: i64, finished: i64, overlap: i32) -> CapacityCheck {
    let used = active_locks + finished;
    let cap = i64::from(overlap);
    if used > cap {
        return CapacityCheck::Violated {
            active_locks,
            finished,
            overlap,
        };
    }
    if used == cap {
        return CapacityCheck::Saturated;
    }
    CapacityCheck::Open {
        remaining: cap - used,
    }
}

// ---------------------------------------------------------------------------
// Low-agreement ordering
// ---------------------------------------------------------------------------

/// Sort `(task, agreement)` pairs so the least-agreed-upon task comes
/// first. Ties break by ascending task id to keep re-offers stable.
pub fn rank_by_agreement(scored: &mut [(DbId, f64)]) {
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
