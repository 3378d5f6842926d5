//! Inter-annotator agreement scoring (PRD-33).
//!
//! Agreement is the fraction of annotation pairs whose result payloads
//! are exactly equal. Coarse, but cheap and monotonic: identical labels
//! score 1.0, a full disagreement scores 0.0. Projects that need a
//! label-config-aware metric compute it upstream and only consume the
//! threshold comparison here.

use serde_json::Value;

/// Score agreement across submitted result payloads.
///
/// Returns `None` when fewer than two results exist (agreement is
/// undefined, not zero). Ground-truth and cancelled annotations must be
/// filtered out by the caller before scoring.
pub fn agreement_score(results: &[Value]) -> Option<f64> {
    if results.len() < 2 {
        return None;
    }

    let mut agreeing: u64 = 0;
    let mut pairs: u64 = 0;
    for (i, left) in results.iter().enumerate() {
        for right in &results[i + 1..] {
            pairs += 1;
            if left == right {
                agreeing += 1;
            }
        }
    }

    Some(agreeing as f64 / pairs as f64)
}

/// Whether a scored task falls below a configured agreement threshold.
///
/// Unscorable tasks (single annotation) never qualify as low agreement.
pub fn is_low_agreement(score: Option<f64>, threshold: f64) -> bool {
    match score {
        Some(s) => s < threshold,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
