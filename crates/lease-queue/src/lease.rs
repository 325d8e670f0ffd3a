//! Lease and long-poll negotiation for claims.
//!
//! A consumer that can only hold a lease for `T` seconds must never sit inside
//! a receive call for longer than `T`. The wait time of every claim is
//! therefore clamped down to the lease, except that a configured wait of zero
//! always means short polling.

use crate::config::MAX_VISIBILITY_TIMEOUT_SECONDS;
use tracing::warn;

/// Parameters actually sent with a receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTerms {
    pub visibility_timeout_seconds: u32,
    pub wait_time_seconds: u32,
}

impl LeaseTerms {
    /// Resolve the terms of one claim.
    ///
    /// `requested_lease` of 0 selects `default_visibility`. Leases above the
    /// service maximum are capped.
    pub fn negotiate(requested_lease: u32, default_visibility: u32, configured_wait: u32) -> Self {
        let mut visibility = if requested_lease > 0 {
            requested_lease
        } else {
            default_visibility
        };

        if visibility > MAX_VISIBILITY_TIMEOUT_SECONDS {
            warn!(
                requested = visibility,
                max = MAX_VISIBILITY_TIMEOUT_SECONDS,
                "Lease exceeds service maximum; capping"
            );
            visibility = MAX_VISIBILITY_TIMEOUT_SECONDS;
        }

        Self {
            visibility_timeout_seconds: visibility,
            wait_time_seconds: effective_wait_seconds(configured_wait, visibility),
        }
    }

    /// Check whether the claim will long-poll
    pub fn is_long_poll(&self) -> bool {
        self.wait_time_seconds > 0
    }
}

/// Wait time for a claim holding a lease of `visibility_timeout` seconds
pub fn effective_wait_seconds(configured_wait: u32, visibility_timeout: u32) -> u32 {
    if configured_wait == 0 {
        return 0;
    }
    configured_wait.min(visibility_timeout)
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
