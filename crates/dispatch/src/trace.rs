//! Selection trace: which tiers a dispatch request consulted (PRD-40).
//!
//! The trace is an observability breadcrumb for humans reading logs and
//! API responses. It carries no behavioral meaning.

use serde::Serialize;

/// Precedence tiers of the dispatch chain, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Out-of-band explicit assignment; bypasses the done filter and
    /// takes no new lease.
    Assigned,
    /// The worker already holds a live lease; same task again.
    Continuity,
    /// Done tasks resurfaced for extra opinions, least agreement first.
    LowAgreement,
    /// Tasks carrying a ground-truth annotation.
    GroundTruth,
    /// Partially-annotated tasks, most-covered first.
    BreadthFirst,
    /// Sampling restricted to tasks needing more than one annotator.
    OverlapFirst,
    /// The project's configured sampling strategy.
    Sampling,
    /// The worker's own postponed drafts, oldest first; no new lease.
    Postponed,
    /// Tasks the worker previously skipped, oldest first.
    Skipped,
}

impl Tier {
    /// Return the tier as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Continuity => "continuity",
            Self::LowAgreement => "low_agreement",
            Self::GroundTruth => "ground_truth",
            Self::BreadthFirst => "breadth_first",
            Self::OverlapFirst => "overlap_first",
            Self::Sampling => "sampling",
            Self::Postponed => "postponed",
            Self::Skipped => "skipped",
        }
    }
}

/// Breadcrumb of consulted tiers for one dispatch request.
#[derive(Debug, Clone, Default)]
pub struct SelectionTrace {
    consulted: Vec<Tier>,
    winner: Option<Tier>,
}

impl SelectionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a tier was evaluated.
    pub fn consulted(&mut self, tier: Tier) {
        self.consulted.push(tier);
    }

    /// Record the tier that produced the task.
    pub fn won(&mut self, tier: Tier) {
        self.winner = Some(tier);
    }

    /// The tier that produced the task, if any.
    pub fn winner(&self) -> Option<Tier> {
        self.winner
    }

    /// Render the breadcrumb, e.g.
    /// `"assigned:miss -> continuity:miss -> sampling:hit"`.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.consulted.len().max(1));
        for tier in &self.consulted {
            let outcome = if self.winner == Some(*tier) { "hit" } else { "miss" };
            parts.push(format!("{}:{outcome}", tier.as_str()));
        }
        if parts.is_empty() {
            return "none".to_string();
        }
        parts.join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_strings_are_stable() {
        assert_eq!(Tier::Assigned.as_str(), "assigned");
        assert_eq!(Tier::LowAgreement.as_str(), "low_agreement");
        assert_eq!(Tier::BreadthFirst.as_str(), "breadth_first");
        assert_eq!(Tier::Skipped.as_str(), "skipped");
    }

    #[test]
    fn empty_trace_renders_none() {
        assert_eq!(SelectionTrace::new().render(), "none");
    }

    #[test]
    fn misses_then_hit() {
        let mut trace = SelectionTrace::new();
        trace.consulted(Tier::Assigned);
        trace.consulted(Tier::Continuity);
        trace.consulted(Tier::Sampling);
        trace.won(Tier::Sampling);
        assert_eq!(
            trace.render(),
            "assigned:miss -> continuity:miss -> sampling:hit"
        );
        assert_eq!(trace.winner(), Some(Tier::Sampling));
    }

    #[test]
    fn exhausted_trace_is_all_misses() {
        let mut trace = SelectionTrace::new();
        trace.consulted(Tier::Sampling);
        trace.consulted(Tier::Postponed);
        assert_eq!(trace.render(), "sampling:miss -> postponed:miss");
        assert_eq!(trace.winner(), None);
    }
}
