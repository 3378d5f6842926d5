//! Project entity model and policy snapshot conversion (PRD-31).

use labelq_core::error::CoreError;
use labelq_core::lease;
use labelq_core::policy::{ProjectPolicy, SamplingStrategy, SkipQueuePolicy};
use labelq_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub title: String,
    pub sampling_strategy: String,
    pub maximum_annotations: i32,
    pub show_ground_truth_first: bool,
    pub show_overlap_first: bool,
    pub skip_queue_policy: String,
    pub agreement_threshold: Option<f64>,
    pub max_additional_annotators: i32,
    pub model_version: Option<String>,
    pub annotator_count: i32,
    pub lease_ttl_secs: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// Build the immutable policy snapshot consumed by dispatch.
    ///
    /// Fails when a row carries an unknown strategy/policy string or an
    /// out-of-range value, so bad configuration surfaces at request start
    /// instead of misbehaving deep in the tier chain.
    pub fn policy(&self) -> Result<ProjectPolicy, CoreError> {
        let policy = ProjectPolicy {
            sampling_strategy: SamplingStrategy::from_str(&self.sampling_strategy)?,
            maximum_annotations: self.maximum_annotations,
            show_ground_truth_first: self.show_ground_truth_first,
            show_overlap_first: self.show_overlap_first,
            skip_queue_policy: SkipQueuePolicy::from_str(&self.skip_queue_policy)?,
            agreement_threshold: self.agreement_threshold,
            max_additional_annotators: self.max_additional_annotators,
            model_version: self.model_version.clone(),
            annotator_count: self.annotator_count,
            lease_ttl: lease::effective_ttl(self.lease_ttl_secs.map(i64::from)),
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// DTO for creating a project.
#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub title: String,
    pub sampling_strategy: Option<String>,
    pub maximum_annotations: Option<i32>,
    pub show_ground_truth_first: Option<bool>,
    pub show_overlap_first: Option<bool>,
    pub skip_queue_policy: Option<String>,
    pub agreement_threshold: Option<f64>,
    pub max_additional_annotators: Option<i32>,
    pub model_version: Option<String>,
    pub annotator_count: Option<i32>,
    pub lease_ttl_secs: Option<i32>,
}
