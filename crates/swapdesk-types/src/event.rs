//! Immutable ledger event records.
//!
//! One [`LedgerEvent`] is written per applied balance mutation, keyed by
//! its idempotency [`EventKey`]. Once written, an event is never mutated
//! or deleted; re-applying the same key is a no-op.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, EventKey, UserId};

/// The business source of a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// External deposit picked up by the reconciliation poller.
    Deposit,
    /// Crypto withdrawal to an external address.
    Withdrawal,
    /// Fiat withdrawal through the bank-transfer network.
    BankTransfer,
    /// Debit leg of a coin swap.
    SwapOut,
    /// Credit leg of a coin swap.
    SwapIn,
    /// Seller's escrow consumed on order completion.
    TradeRelease,
    /// Buyer's credit on order completion.
    TradeReceive,
    /// Debit leg of an instant-match transfer.
    InstantDebit,
    /// Credit leg of an instant-match transfer.
    InstantCredit,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
            Self::BankTransfer => write!(f, "BANK_TRANSFER"),
            Self::SwapOut => write!(f, "SWAP_OUT"),
            Self::SwapIn => write!(f, "SWAP_IN"),
            Self::TradeRelease => write!(f, "TRADE_RELEASE"),
            Self::TradeReceive => write!(f, "TRADE_RECEIVE"),
            Self::InstantDebit => write!(f, "INSTANT_DEBIT"),
            Self::InstantCredit => write!(f, "INSTANT_CREDIT"),
        }
    }
}

/// One applied balance mutation. The `key` is globally unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEvent {
    pub key: EventKey,
    pub user_id: UserId,
    pub asset: Asset,
    /// Signed amount: positive credit, negative debit.
    pub amount: Decimal,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

impl LedgerEvent {
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(amount: Decimal) -> LedgerEvent {
        LedgerEvent {
            key: EventKey::new("dep-1"),
            user_id: UserId::new(),
            asset: "BTC".to_string(),
            amount,
            kind: EventKind::Deposit,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credit_debit_classification() {
        assert!(sample_event(Decimal::ONE).is_credit());
        assert!(sample_event(-Decimal::ONE).is_debit());
        assert!(!sample_event(Decimal::ZERO).is_credit());
        assert!(!sample_event(Decimal::ZERO).is_debit());
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", EventKind::Deposit), "DEPOSIT");
        assert_eq!(format!("{}", EventKind::TradeRelease), "TRADE_RELEASE");
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = sample_event(Decimal::new(425, 2));
        let json = serde_json::to_string(&event).unwrap();
        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
