//! OTP-gated session objects.
//!
//! A session is short-lived and single-use: it is created on the first
//! auth/withdrawal attempt, consumed (`active = false`) on successful
//! final-stage verification, and lazily treated as missing once
//! `expires_at` has passed. A fresh session is required after expiry or
//! use; there is no lookup-by-user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, UserId};

/// What a withdrawal session authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalReason {
    CryptoWithdrawal,
    BankTransfer,
    Swap,
}

impl std::fmt::Display for WithdrawalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CryptoWithdrawal => write!(f, "CRYPTO_WITHDRAWAL"),
            Self::BankTransfer => write!(f, "BANK_TRANSFER"),
            Self::Swap => write!(f, "SWAP"),
        }
    }
}

/// The two instances of the OTP pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// Two-stage: OTP, then an optional second factor.
    Login { requires_second_factor: bool },
    /// One-stage: OTP only, tagged with the withdrawal reason.
    Withdrawal { reason: WithdrawalReason },
}

/// An ephemeral OTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    /// Where the one-time code was mailed.
    pub email: String,
    pub kind: SessionKind,
    /// The code currently expected. Replaced by a fresh code when the
    /// second login stage begins.
    pub code: String,
    pub code_verified: bool,
    pub second_factor_verified: bool,
    /// Cleared on consumption; a consumed session is indistinguishable
    /// from a missing one to callers.
    pub active: bool,
    /// Failed verification attempts so far.
    pub attempts: u8,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the session can still be verified at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }
}
