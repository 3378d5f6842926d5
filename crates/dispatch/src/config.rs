//! Engine tuning knobs (PRD-40).

/// Default number of candidates fetched per claim window.
const DEFAULT_SAMPLE_WINDOW: i64 = 16;

/// Default upper bound on candidates scanned for uncertainty ordering.
const DEFAULT_UNCERTAINTY_SCAN_LIMIT: i64 = 512;

/// Tuning knobs for the dispatch engine, fixed at construction.
///
/// Windows bound every candidate query so dispatch never scans a whole
/// project's task table under high cardinality; a claim that loses every
/// race in a window refreshes the window once before falling through.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum candidates fetched per claim window.
    pub sample_window: i64,
    /// Maximum candidates scanned when ordering for uncertainty sampling.
    pub uncertainty_scan_limit: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
            uncertainty_scan_limit: DEFAULT_UNCERTAINTY_SCAN_LIMIT,
        }
    }
}

impl DispatchConfig {
    /// Build a config from `LABELQ_SAMPLE_WINDOW` and
    /// `LABELQ_UNCERTAINTY_SCAN_LIMIT`, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_window: env_i64("LABELQ_SAMPLE_WINDOW").unwrap_or(defaults.sample_window),
            uncertainty_scan_limit: env_i64("LABELQ_UNCERTAINTY_SCAN_LIMIT")
                .unwrap_or(defaults.uncertainty_scan_limit),
        }
    }
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok()?.parse().ok().filter(|v| *v > 0)
}
