//! Lease duration constants (PRD-34).
//!
//! A task lock is a short-lived lease: it expires on its own, so an
//! abandoned browser tab cannot strand an overlap slot. Projects may
//! configure the duration; a floor keeps misconfigured projects from
//! thrashing locks faster than a worker can label.

use chrono::Duration;

/// Shortest lease a project may configure, in seconds.
pub const MIN_LEASE_TTL_SECS: i64 = 60;

/// Lease duration used when a project does not configure one, in seconds.
pub const DEFAULT_LEASE_TTL_SECS: i64 = 1800;

/// Resolve the lease duration for new locks.
///
/// `configured` is the project's `lease_ttl_secs` column; `None` or any
/// value under the minimum falls back as documented on the constants.
pub fn effective_ttl(configured: Option<i64>) -> Duration {
    match configured {
        Some(secs) if secs >= MIN_LEASE_TTL_SECS => Duration::seconds(secs),
        Some(_) => Duration::seconds(MIN_LEASE_TTL_SECS),
        None => Duration::seconds(DEFAULT_LEASE_TTL_SECS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_uses_default() {
        assert_eq!(
            effective_ttl(None),
            Duration::seconds(DEFAULT_LEASE_TTL_SECS)
        );
    }

    #[test]
    fn configured_value_respected() {
        assert_eq!(effective_ttl(Some(600)), Duration::seconds(600));
    }

    #[test]
    fn configured_at_minimum_respected() {
        assert_eq!(
            effective_ttl(Some(MIN_LEASE_TTL_SECS)),
            Duration::seconds(MIN_LEASE_TTL_SECS)
        );
    }

    #[test]
    fn configured_below_minimum_floored() {
        assert_eq!(
            effective_ttl(Some(5)),
            Duration::seconds(MIN_LEASE_TTL_SECS)
        );
    }

    #[test]
    fn zero_floored() {
        assert_eq!(
            effective_ttl(Some(0)),
            Duration::seconds(MIN_LEASE_TTL_SECS)
        );
    }

    #[test]
    fn negative_floored() {
        assert_eq!(
            effective_ttl(Some(-30)),
            Duration::seconds(MIN_LEASE_TTL_SECS)
        );
    }
}
