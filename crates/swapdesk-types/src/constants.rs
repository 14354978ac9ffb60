//! System-wide limits and defaults.
//!
//! Access via `swapdesk_types::constants::FOO` (not re-exported, to
//! avoid name collisions).

/// OTP session time-to-live in seconds (5 minutes).
pub const SESSION_TTL_SECS: i64 = 300;

/// Number of digits in a one-time code.
pub const OTP_CODE_LEN: usize = 6;

/// Failed OTP verifications before the session is terminally dead.
pub const MAX_OTP_ATTEMPTS: u8 = 5;

/// Reconciliation poller interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// External provider call timeout in seconds. Past this the outcome is
/// treated as unresolved, not failed.
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Prefix of a structured deposit reference id: `dep:{user-uuid}`.
pub const DEPOSIT_REFERENCE_PREFIX: &str = "dep:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_defaults() {
        assert_eq!(SESSION_TTL_SECS, 300);
        assert!(OTP_CODE_LEN >= 6);
        assert!(MAX_OTP_ATTEMPTS > 0);
        assert!(PROVIDER_TIMEOUT_SECS > 0);
    }
}
