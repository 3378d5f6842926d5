use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    // Health check
    labelq_db::health_check(&pool).await.unwrap();

    // All six tables exist and start empty.
    let tables = [
        "projects",
        "tasks",
        "annotations",
        "predictions",
        "task_locks",
        "annotation_drafts",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// The policy CHECK constraints reject unknown enum strings.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_policy_check_constraints(pool: PgPool) {
    let bad_strategy = sqlx::query(
        "INSERT INTO projects (title, sampling_strategy) VALUES ('t', 'round_robin')",
    )
    .execute(&pool)
    .await;
    assert!(bad_strategy.is_err(), "unknown sampling strategy should be rejected");

    let bad_skip_policy = sqlx::query(
        "INSERT INTO projects (title, skip_queue_policy) VALUES ('t', 'drop')",
    )
    .execute(&pool)
    .await;
    assert!(bad_skip_policy.is_err(), "unknown skip queue policy should be rejected");

    let zero_overlap = sqlx::query(
        "INSERT INTO tasks (project_id, overlap) VALUES (1, 0)",
    )
    .execute(&pool)
    .await;
    assert!(zero_overlap.is_err(), "overlap below 1 should be rejected");
}
