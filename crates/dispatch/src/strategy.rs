//! Sampling strategies: pick a task out of the candidate set (PRD-43).
//!
//! The strategy variant comes from the project policy snapshot, resolved
//! once per request — no string dispatch at pick time. Each strategy
//! produces an ordered claim window; the orchestrator walks it and the
//! first task whose claim is granted wins, so no strategy ever hands out
//! a task exclusively held by another worker.

use std::collections::HashMap;

use labelq_core::policy::{ProjectPolicy, SamplingStrategy};
use labelq_core::types::DbId;
use rand::Rng;
use sqlx::PgPool;

use crate::candidates::{self, CandidateCtx};
use crate::config::DispatchConfig;

/// One uncertainty-sampling candidate: a task with its most uncertain
/// current-model prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyCandidate {
    pub task_id: DbId,
    /// Prediction cluster; `None` = unclustered, treated as one bucket.
    pub cluster: Option<i32>,
    /// Uncertainty proxy, lower = less confident.
    pub score: f64,
}

/// Order candidates for uncertainty sampling: primarily by how many
/// tasks of the same cluster the worker has already finished (favor
/// least-exhausted clusters), secondarily by ascending score (favor most
/// uncertain). Ties break by task id to keep windows stable.
pub fn order_by_cluster_exhaustion(
    candidates: &mut [UncertaintyCandidate],
    solved: &HashMap<Option<i32>, i64>,
) {
    candidates.sort_by(|a, b| {
        let solved_a = solved.get(&a.cluster).copied().unwrap_or(0);
        let solved_b = solved.get(&b.cluster).copied().unwrap_or(0);
        solved_a
            .cmp(&solved_b)
            .then(a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.task_id.cmp(&b.task_id))
    });
}

/// Size of the leading window concurrent annotators are spread across.
///
/// With more than one concurrent annotator, handing everyone the strict
/// head of the list makes them collide on the same lock; sampling inside
/// a window of `annotator_count + 1` spreads them. A single annotator
/// keeps the deterministic head.
pub fn contention_window(annotator_count: i32, candidate_count: usize) -> usize {
    if candidate_count == 0 {
        return 0;
    }
    if annotator_count > 1 {
        (annotator_count as usize + 1).min(candidate_count)
    } else {
        1
    }
}

/// Promote a random element of the leading `window` to the front,
/// leaving the rest of the order intact as claim fallbacks.
pub fn promote_random_leader<R: Rng>(ids: &mut [DbId], window: usize, rng: &mut R) {
    if window > 1 {
        let lead = rng.random_range(0..window.min(ids.len()));
        ids.swap(0, lead);
    }
}

/// Produce the ordered claim window for the project's configured
/// sampling strategy.
///
/// Uncertainty degrades to uniform-random when the project has no model
/// version or no candidate carries a current-model prediction.
pub async fn sampling_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    policy: &ProjectPolicy,
    config: &DispatchConfig,
) -> Result<Vec<DbId>, sqlx::Error> {
    match policy.sampling_strategy {
        SamplingStrategy::Sequential => {
            candidates::sequential_window(pool, ctx, config.sample_window).await
        }
        SamplingStrategy::UniformRandom => {
            candidates::random_window(pool, ctx, config.sample_window).await
        }
        SamplingStrategy::Uncertainty => {
            uncertainty_window(pool, ctx, policy, config).await
        }
    }
}

async fn uncertainty_window(
    pool: &PgPool,
    ctx: &CandidateCtx,
    policy: &ProjectPolicy,
    config: &DispatchConfig,
) -> Result<Vec<DbId>, sqlx::Error> {
    let Some(model_version) = policy.model_version.as_deref() else {
        return candidates::random_window(pool, ctx, config.sample_window).await;
    };

    let mut scored =
        candidates::uncertainty_candidates(pool, ctx, model_version, config.uncertainty_scan_limit)
            .await?;
    if scored.is_empty() {
        // No current-model predictions; degrade to uniform random.
        return candidates::random_window(pool, ctx, config.sample_window).await;
    }

    let solved =
        candidates::solved_per_cluster(pool, ctx.project_id, ctx.worker, model_version).await?;
    order_by_cluster_exhaustion(&mut scored, &solved);

    let mut ids: Vec<DbId> = scored.into_iter().map(|c| c.task_id).collect();
    ids.truncate(config.sample_window as usize);

    let window = contention_window(policy.annotator_count, ids.len());
    promote_random_leader(&mut ids, window, &mut rand::rng());
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(task_id: DbId, cluster: Option<i32>, score: f64) -> UncertaintyCandidate {
        UncertaintyCandidate {
            task_id,
            cluster,
            score,
        }
    }

    // -- order_by_cluster_exhaustion ---------------------------------------

    #[test]
    fn least_exhausted_cluster_first() {
        let mut cands = vec![
            candidate(1, Some(1), 0.1),
            candidate(2, Some(2), 0.9),
            candidate(3, Some(1), 0.5),
        ];
        let solved = HashMap::from([(Some(1), 4), (Some(2), 0)]);
        order_by_cluster_exhaustion(&mut cands, &solved);
        assert_eq!(
            cands.iter().map(|c| c.task_id).collect::<Vec<_>>(),
            vec![2, 1, 3]
        );
    }

    #[test]
    fn score_breaks_ties_within_cluster() {
        let mut cands = vec![
            candidate(1, Some(1), 0.8),
            candidate(2, Some(1), 0.2),
            candidate(3, Some(1), 0.5),
        ];
        order_by_cluster_exhaustion(&mut cands, &HashMap::new());
        assert_eq!(
            cands.iter().map(|c| c.task_id).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
    }

    #[test]
    fn unsolved_cluster_counts_as_zero() {
        let mut cands = vec![candidate(1, Some(9), 0.9), candidate(2, None, 0.1)];
        let solved = HashMap::from([(Some(9), 2)]);
        order_by_cluster_exhaustion(&mut cands, &solved);
        assert_eq!(cands[0].task_id, 2);
    }

    #[test]
    fn task_id_breaks_full_ties() {
        let mut cands = vec![candidate(7, None, 0.5), candidate(3, None, 0.5)];
        order_by_cluster_exhaustion(&mut cands, &HashMap::new());
        assert_eq!(cands[0].task_id, 3);
    }

    // -- contention_window -------------------------------------------------

    #[test]
    fn single_annotator_keeps_deterministic_head() {
        assert_eq!(contention_window(1, 10), 1);
    }

    #[test]
    fn concurrent_annotators_widen_window() {
        assert_eq!(contention_window(3, 10), 4);
    }

    #[test]
    fn window_capped_by_candidate_count() {
        assert_eq!(contention_window(5, 2), 2);
    }

    #[test]
    fn empty_candidates_empty_window() {
        assert_eq!(contention_window(3, 0), 0);
    }

    // -- promote_random_leader ---------------------------------------------

    #[test]
    fn window_of_one_is_stable() {
        let mut ids = vec![10, 20, 30];
        promote_random_leader(&mut ids, 1, &mut rand::rng());
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn leader_comes_from_window() {
        let mut ids = vec![10, 20, 30, 40];
        promote_random_leader(&mut ids, 3, &mut rand::rng());
        assert!([10, 20, 30].contains(&ids[0]));
        // Nothing lost, nothing duplicated.
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, vec![10, 20, 30, 40]);
    }
}
