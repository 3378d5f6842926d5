//! Prediction entity model and DTOs (PRD-35).
//!
//! Predictions are produced by the external ML backend and are read-only
//! to dispatch; uncertainty sampling consumes `score` and `cluster`.

use labelq_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `predictions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Prediction {
    pub id: DbId,
    pub task_id: DbId,
    pub model_version: String,
    /// Uncertainty proxy; lower = less confident.
    pub score: f64,
    /// Topic group for balanced sampling; NULL = unclustered.
    pub cluster: Option<i32>,
    pub result: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for registering a prediction.
#[derive(Debug, Deserialize)]
pub struct CreatePrediction {
    pub model_version: String,
    pub score: f64,
    pub cluster: Option<i32>,
    pub result: serde_json::Value,
}
