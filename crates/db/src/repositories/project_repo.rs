//! Repository for the `projects` table (PRD-31).

use labelq_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::{CreateProject, Project};

/// Column list for `projects` queries.
const COLUMNS: &str = "\
    id, title, sampling_strategy, maximum_annotations, \
    show_ground_truth_first, show_overlap_first, skip_queue_policy, \
    agreement_threshold, max_additional_annotators, model_version, \
    annotator_count, lease_ttl_secs, created_at, updated_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Create a new project. Omitted policy fields take column defaults.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects \
                 (title, sampling_strategy, maximum_annotations, \
                  show_ground_truth_first, show_overlap_first, skip_queue_policy, \
                  agreement_threshold, max_additional_annotators, model_version, \
                  annotator_count, lease_ttl_secs) \
             VALUES ($1, COALESCE($2, 'sequential'), COALESCE($3, 1), \
                     COALESCE($4, FALSE), COALESCE($5, FALSE), \
                     COALESCE($6, 'requeue_for_me'), $7, COALESCE($8, 0), $9, \
                     COALESCE($10, 1), $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.title)
            .bind(&input.sampling_strategy)
            .bind(input.maximum_annotations)
            .bind(input.show_ground_truth_first)
            .bind(input.show_overlap_first)
            .bind(&input.skip_queue_policy)
            .bind(input.agreement_threshold)
            .bind(input.max_additional_annotators)
            .bind(&input.model_version)
            .bind(input.annotator_count)
            .bind(input.lease_ttl_secs)
            .fetch_one(pool)
            .await
    }

    /// Find a project by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
