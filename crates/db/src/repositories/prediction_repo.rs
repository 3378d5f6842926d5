//! Repository for the `predictions` table (PRD-35).
//!
//! Predictions arrive from the external ML backend; dispatch only reads
//! them, so this repository stays insert-and-list.

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::prediction::{CreatePrediction, Prediction};

/// Column list for `predictions` queries.
const COLUMNS: &str = "id, task_id, model_version, score, cluster, result, created_at";

/// Provides storage operations for predictions.
pub struct PredictionRepo;

impl PredictionRepo {
    /// Register a prediction for a task.
    pub async fn create(
        pool: &PgPool,
        task_id: DbId,
        input: &CreatePrediction,
    ) -> Result<Prediction, sqlx::Error> {
        let query = format!(
            "INSERT INTO predictions (task_id, model_version, score, cluster, result) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prediction>(&query)
            .bind(task_id)
            .bind(&input.model_version)
            .bind(input.score)
            .bind(input.cluster)
            .bind(&input.result)
            .fetch_one(pool)
            .await
    }

    /// List a task's predictions, newest first.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Vec<Prediction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM predictions WHERE task_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Prediction>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }
}
