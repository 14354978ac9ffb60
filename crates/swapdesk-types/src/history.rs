//! Provider-specific history records.
//!
//! Separate from [`crate::LedgerEvent`]: these carry provider status
//! fields for audit and display, and let an unresolved withdrawal be
//! settled later by its idempotency key. A record's ledger effect only
//! ever happens through the event applier.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, EventKey, UserId};

/// Status reported by an external provider for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderStatus {
    /// The provider confirmed the operation. Safe to settle.
    Completed,
    /// Outcome unknown (in flight, or our call timed out). Requires a
    /// status query before any ledger effect.
    Pending,
    /// The provider rejected the operation. Safe to release escrow.
    Failed,
}

impl ProviderStatus {
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Pending => write!(f, "PENDING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Audit record for one crypto withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub key: EventKey,
    pub user_id: UserId,
    pub asset: Asset,
    pub amount: Decimal,
    pub address: String,
    pub chain: String,
    pub provider_record_id: Option<String>,
    pub tx_id: Option<String>,
    pub status: ProviderStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Audit record for one bank transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransferRecord {
    pub key: EventKey,
    pub user_id: UserId,
    pub fiat_asset: Asset,
    pub amount: Decimal,
    pub recipient_id: String,
    pub fee: Option<Decimal>,
    pub reference: Option<String>,
    pub status: ProviderStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Audit record for one coin swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub key: EventKey,
    pub user_id: UserId,
    pub asset_in: Asset,
    pub amount_in: Decimal,
    pub asset_out: Asset,
    pub amount_out: Decimal,
    pub fee: Decimal,
    pub status: ProviderStatus,
    pub created_at: DateTime<Utc>,
}
