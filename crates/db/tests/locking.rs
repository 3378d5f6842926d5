use chrono::Duration;
use serde_json::json;
use sqlx::PgPool;

use labelq_db::models::annotation::SubmitAnnotation;
use labelq_db::models::project::CreateProject;
use labelq_db::models::task::CreateTask;
use labelq_db::repositories::{AnnotationRepo, ClaimOutcome, LockRepo, ProjectRepo, TaskRepo};

fn ttl() -> Duration {
    Duration::seconds(300)
}

async fn seed_task(pool: &PgPool, overlap: i32) -> i64 {
    let project = ProjectRepo::create(
        pool,
        &CreateProject {
            title: "locking".into(),
            sampling_strategy: None,
            maximum_annotations: Some(overlap),
            show_ground_truth_first: None,
            show_overlap_first: None,
            skip_queue_policy: None,
            agreement_threshold: None,
            max_additional_annotators: None,
            model_version: None,
            annotator_count: None,
            lease_ttl_secs: None,
        },
    )
    .await
    .unwrap();
    TaskRepo::create(
        pool,
        project.id,
        &CreateTask {
            overlap: None,
            assignee_id: None,
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_then_reclaim_confirms_ownership(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::AlreadyHeld
    );
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_worker_refused_at_overlap_one(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Saturated
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overlap_two_admits_two_workers_not_three(pool: PgPool) {
    let task_id = seed_task(&pool, 2).await;

    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 3, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Saturated
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn finished_annotations_consume_lease_capacity(pool: PgPool) {
    let task_id = seed_task(&pool, 2).await;

    AnnotationRepo::submit(
        &pool,
        task_id,
        1,
        &SubmitAnnotation {
            result: json!({"label": "cat"}),
            ground_truth: None,
        },
    )
    .await
    .unwrap();

    // One slot left after the finished annotation.
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 3, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Saturated
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ground_truth_does_not_consume_capacity(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    sqlx::query(
        "INSERT INTO annotations (task_id, completed_by, result, ground_truth) \
         VALUES ($1, 99, '{}'::jsonb, TRUE)",
    )
    .bind(task_id)
    .execute(&pool)
    .await
    .unwrap();

    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lease_is_reclaimable_without_release(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    // Simulate a lease that lapsed: insert directly with a past expiry.
    sqlx::query(
        "INSERT INTO task_locks (task_id, user_id, expire_at) \
         VALUES ($1, 1, NOW() - INTERVAL '1 minute')",
    )
    .bind(task_id)
    .execute(&pool)
    .await
    .unwrap();

    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 0);
    assert_eq!(LockRepo::is_saturated(&pool, task_id).await.unwrap(), Some(false));

    // Another worker claims straight through the stale row.
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Claimed
    );

    // The stale row was purged during the claim.
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_locks WHERE task_id = $1")
        .bind(task_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listed_leases_carry_a_future_expiry(pool: PgPool) {
    let task_id = seed_task(&pool, 2).await;

    LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap();
    LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap();

    let leases = LockRepo::list_for_task(&pool, task_id).await.unwrap();
    assert_eq!(leases.len(), 2);
    assert_eq!(leases[0].user_id, 1, "oldest lease first");
    let now = chrono::Utc::now();
    for lease in &leases {
        assert!(lease.expire_at > now);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_is_idempotent(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap();
    LockRepo::release(&pool, task_id, Some(1)).await.unwrap();
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 0);

    // Second release: no error, no side effect.
    LockRepo::release(&pool, task_id, Some(1)).await.unwrap();
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_without_worker_clears_all_leases(pool: PgPool) {
    let task_id = seed_task(&pool, 2).await;

    LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap();
    LockRepo::try_claim(&pool, task_id, 2, ttl(), false, 0).await.unwrap();
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 2);

    LockRepo::release(&pool, task_id, None).await.unwrap();
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn saturated_predicate_counts_leases_and_annotations(pool: PgPool) {
    let task_id = seed_task(&pool, 2).await;
    assert_eq!(LockRepo::is_saturated(&pool, task_id).await.unwrap(), Some(false));

    LockRepo::try_claim(&pool, task_id, 1, ttl(), false, 0).await.unwrap();
    assert_eq!(LockRepo::is_saturated(&pool, task_id).await.unwrap(), Some(false));

    AnnotationRepo::submit(
        &pool,
        task_id,
        2,
        &SubmitAnnotation {
            result: json!({"label": "cat"}),
            ground_truth: None,
        },
    )
    .await
    .unwrap();

    // One live lease + one finished annotation = overlap 2.
    assert_eq!(LockRepo::is_saturated(&pool, task_id).await.unwrap(), Some(true));

    assert_eq!(
        LockRepo::is_saturated(&pool, 999_999).await.unwrap(),
        None,
        "unknown task has no saturation state"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn find_active_for_worker_scopes_by_project(pool: PgPool) {
    let task_a = seed_task(&pool, 1).await;
    let task_b = seed_task(&pool, 1).await;

    LockRepo::try_claim(&pool, task_a, 1, ttl(), false, 0).await.unwrap();
    LockRepo::try_claim(&pool, task_b, 2, ttl(), false, 0).await.unwrap();

    let project_a: i64 = sqlx::query_scalar("SELECT project_id FROM tasks WHERE id = $1")
        .bind(task_a)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(
        LockRepo::find_active_for_worker(&pool, project_a, 1).await.unwrap(),
        Some(task_a)
    );
    assert_eq!(
        LockRepo::find_active_for_worker(&pool, project_a, 2).await.unwrap(),
        None
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn corrupted_capacity_is_refused_not_fatal(pool: PgPool) {
    let task_id = seed_task(&pool, 1).await;

    // Simulate corrupted data: two live leases on an overlap-1 task.
    sqlx::query(
        "INSERT INTO task_locks (task_id, user_id, expire_at) \
         VALUES ($1, 1, NOW() + INTERVAL '5 minutes'), \
                ($1, 2, NOW() + INTERVAL '5 minutes')",
    )
    .bind(task_id)
    .execute(&pool)
    .await
    .unwrap();

    // The claim is refused like any saturated task; the violation is a
    // log line, not an error, and the rows are left for repair tooling.
    assert_eq!(
        LockRepo::try_claim(&pool, task_id, 3, ttl(), false, 0).await.unwrap(),
        ClaimOutcome::Saturated
    );
    assert_eq!(LockRepo::active_count(&pool, task_id).await.unwrap(), 2);
}
