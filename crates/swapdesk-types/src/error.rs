//! Error types for the swapdesk trading core.
//!
//! All errors use the `SD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation / authorization errors
//! - 2xx: Balance / ledger errors
//! - 3xx: Session / OTP errors
//! - 4xx: Market errors (advertisements, orders, instant trades)
//! - 5xx: External network errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AdvertisementId, OrderId, SessionId, TradeId};

/// Central error enum for all swapdesk operations.
#[derive(Debug, Error)]
pub enum SwapdeskError {
    // =================================================================
    // Validation / Authorization (1xx)
    // =================================================================
    /// Bad input shape or range. Never touches the ledger.
    #[error("SD_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// The actor is not a participant in the order or withdrawal
    /// they are acting on.
    #[error("SD_ERR_101: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // =================================================================
    // Balance / Ledger (2xx)
    // =================================================================
    /// A debit would drive the available balance below zero.
    #[error("SD_ERR_200: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// A hold release or settlement exceeds the locked balance.
    #[error("SD_ERR_201: Insufficient locked balance")]
    InsufficientLocked,

    /// No balance record exists for the (user, asset) pair.
    #[error("SD_ERR_202: Balance not found for asset {asset}")]
    BalanceNotFound { asset: String },

    // =================================================================
    // Session / OTP (3xx)
    // =================================================================
    /// The session is expired, consumed, or was never issued. The three
    /// cases are deliberately indistinguishable to the caller.
    #[error("SD_ERR_300: Session expired or missing: {0}")]
    SessionExpiredOrMissing(SessionId),

    /// The supplied one-time code does not match (case-sensitive).
    #[error("SD_ERR_301: Invalid one-time code")]
    InvalidCode,

    /// Too many failed verification attempts; the session is dead.
    #[error("SD_ERR_302: OTP attempts exhausted for session {0}")]
    OtpAttemptsExhausted(SessionId),

    // =================================================================
    // Market (4xx)
    // =================================================================
    /// The requested advertisement was not found or is soft-deleted.
    #[error("SD_ERR_400: Advertisement not found: {0}")]
    AdvertisementNotFound(AdvertisementId),

    /// The advertisement exists but is not accepting orders.
    #[error("SD_ERR_401: Advertisement inactive: {0}")]
    AdvertisementInactive(AdvertisementId),

    /// The requested order was not found.
    #[error("SD_ERR_402: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order cannot make the requested transition from its
    /// current state.
    #[error("SD_ERR_403: Invalid order transition: {from} -> {to}")]
    InvalidOrderTransition { from: String, to: String },

    /// The requested instant trade was not found.
    #[error("SD_ERR_404: Instant trade not found: {0}")]
    TradeNotFound(TradeId),

    // =================================================================
    // External network (5xx)
    // =================================================================
    /// The provider call failed outright. No ledger effect occurred.
    #[error("SD_ERR_500: External network error: {reason}")]
    ExternalNetwork { reason: String },

    /// The provider call timed out or is still pending: the outcome is
    /// unknown. Funds stay escrowed until a status query resolves it.
    /// Distinct from [`SwapdeskError::ExternalNetwork`] so callers poll
    /// instead of assuming loss.
    #[error("SD_ERR_501: Provider outcome unresolved for key {key}")]
    Unresolved { key: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SD_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SD_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl SwapdeskError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for authorization failures.
    #[must_use]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Whether the caller may safely retry (provider-side trouble),
    /// mapped to 5xx-class responses by the HTTP layer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalNetwork { .. } | Self::Unresolved { .. } | Self::Internal(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SwapdeskError>;
