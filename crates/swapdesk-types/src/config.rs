//! Configuration types for the swapdesk core.

use serde::{Deserialize, Serialize};

use crate::constants;

/// OTP session gate configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session time-to-live in seconds. Tests use zero or negative
    /// values to exercise expiry without sleeping.
    pub ttl_secs: i64,
    /// Failed verifications before the session is terminally dead.
    pub max_attempts: u8,
}

impl SessionConfig {
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: constants::SESSION_TTL_SECS,
            max_attempts: constants::MAX_OTP_ATTEMPTS,
        }
    }
}

/// Reconciliation poller configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between ticks.
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: constants::DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// External provider call configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Call timeout in seconds. Elapsing means *unresolved*, not failed.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: constants::PROVIDER_TIMEOUT_SECS,
        }
    }
}
