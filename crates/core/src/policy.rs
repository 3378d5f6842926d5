//! Per-project dispatch policy snapshot (PRD-31).
//!
//! A [`ProjectPolicy`] is read once at the start of a dispatch request and
//! treated as immutable for its duration. The string enums map to TEXT
//! columns in the `projects` table.

use crate::error::CoreError;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Sampling strategy
// ---------------------------------------------------------------------------

/// How the sampler picks a task out of the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// First candidate in ascending task-id order.
    Sequential,
    /// Random candidate from a bounded sample window.
    UniformRandom,
    /// Active learning: least-exhausted prediction cluster, lowest score.
    Uncertainty,
}

/// All valid sampling strategy strings.
const VALID_STRATEGY_STRINGS: &[&str] = &["sequential", "uniform_random", "uncertainty"];

impl SamplingStrategy {
    /// Return the strategy as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::UniformRandom => "uniform_random",
            Self::Uncertainty => "uncertainty",
        }
    }

    /// Parse a strategy from a string slice.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "uniform_random" => Ok(Self::UniformRandom),
            "uncertainty" => Ok(Self::Uncertainty),
            _ => Err(CoreError::Validation(format!(
                "Invalid sampling strategy '{s}'. Must be one of: {}",
                VALID_STRATEGY_STRINGS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Skip queue policy
// ---------------------------------------------------------------------------

/// What happens to a task a worker explicitly skipped (cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipQueuePolicy {
    /// Skips count as finished work; the task is never re-offered.
    Ignore,
    /// Skipped tasks are re-offered to the same worker, oldest first.
    RequeueForMe,
}

/// All valid skip queue policy strings.
const VALID_SKIP_POLICY_STRINGS: &[&str] = &["ignore", "requeue_for_me"];

impl SkipQueuePolicy {
    /// Return the policy as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::RequeueForMe => "requeue_for_me",
        }
    }

    /// Parse a skip queue policy from a string slice.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "requeue_for_me" => Ok(Self::RequeueForMe),
            _ => Err(CoreError::Validation(format!(
                "Invalid skip queue policy '{s}'. Must be one of: {}",
                VALID_SKIP_POLICY_STRINGS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker role
// ---------------------------------------------------------------------------

/// Role of the requesting worker, resolved by the identity collaborator.
///
/// Low-agreement resurfacing only applies to annotators; reviewers see
/// the regular queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Annotator,
    Reviewer,
}

// ---------------------------------------------------------------------------
// Policy snapshot
// ---------------------------------------------------------------------------

/// Immutable-during-dispatch snapshot of a project's queueing settings.
#[derive(Debug, Clone)]
pub struct ProjectPolicy {
    pub sampling_strategy: SamplingStrategy,
    /// Overlap ceiling for normal tasks; also the default task overlap.
    pub maximum_annotations: i32,
    pub show_ground_truth_first: bool,
    pub show_overlap_first: bool,
    pub skip_queue_policy: SkipQueuePolicy,
    /// When set, done tasks below this agreement are resurfaced.
    pub agreement_threshold: Option<f64>,
    /// Extra annotators allowed on a resurfaced low-agreement task.
    pub max_additional_annotators: i32,
    /// Model version tag predictions must carry for uncertainty sampling.
    pub model_version: Option<String>,
    /// Number of annotators expected to work the project concurrently.
    pub annotator_count: i32,
    /// Lease duration for new task locks, already floored at the system
    /// minimum (see [`crate::lease::effective_ttl`]).
    pub lease_ttl: chrono::Duration,
}

impl ProjectPolicy {
    /// Whether cancelled (skipped) annotations count toward "finished".
    ///
    /// Under [`SkipQueuePolicy::Ignore`] a skip consumes an overlap slot;
    /// under [`SkipQueuePolicy::RequeueForMe`] it does not.
    pub fn cancelled_counts_as_finished(&self) -> bool {
        self.skip_queue_policy == SkipQueuePolicy::Ignore
    }

    /// Validate field ranges. Called when a snapshot is loaded from the
    /// database, so a bad row surfaces as a policy error rather than as
    /// silent misbehavior deep in the tier chain.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.maximum_annotations < 1 {
            return Err(CoreError::Validation(format!(
                "maximum_annotations must be >= 1, got {}",
                self.maximum_annotations
            )));
        }
        if self.annotator_count < 1 {
            return Err(CoreError::Validation(format!(
                "annotator_count must be >= 1, got {}",
                self.annotator_count
            )));
        }
        if self.max_additional_annotators < 0 {
            return Err(CoreError::Validation(format!(
                "max_additional_annotators must be >= 0, got {}",
                self.max_additional_annotators
            )));
        }
        if let Some(threshold) = self.agreement_threshold {
            if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
                return Err(CoreError::Validation(format!(
                    "agreement_threshold must be within 0.0..=1.0, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
