//! Balance tracking types for the swapdesk ledger.
//!
//! Every (user, asset) pair has an `available` balance (spendable) and a
//! `locked` balance (escrowed by open orders or unresolved withdrawals).
//! Both are invariantly non-negative: a mutation that would drive either
//! below zero is rejected, never clamped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Type alias for asset identifiers (e.g., "BTC", "USDT", "NGN").
pub type Asset = String;

/// Key for a single ledger account.
pub type AccountKey = (UserId, Asset);

/// A single balance record for a (user, asset) pair.
///
/// Created lazily on the first credit for the pair; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    /// Spendable amount. Never negative.
    pub available: Decimal,
    /// Escrowed amount (open orders, unresolved withdrawals). Never negative.
    pub locked: Decimal,
    /// Display name of the asset (e.g., "Bitcoin").
    pub name: String,
    /// Display logo URL for the asset.
    pub logo: String,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create a zero balance with the given display metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, logo: impl Into<String>) -> Self {
        Self {
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            name: name.into(),
            logo: logo.into(),
            updated_at: Utc::now(),
        }
    }

    /// Total balance (available + locked).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    /// Whether this record holds no value at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.locked.is_zero()
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Display metadata for an asset, stamped onto lazily created balances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetInfo {
    pub symbol: Asset,
    pub name: String,
    pub logo: String,
}

impl AssetInfo {
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        logo: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            logo: logo.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_default_is_zero() {
        let bal = Balance::default();
        assert_eq!(bal.available, Decimal::ZERO);
        assert_eq!(bal.locked, Decimal::ZERO);
        assert!(bal.is_zero());
    }

    #[test]
    fn balance_total() {
        let bal = Balance {
            available: Decimal::new(100, 0),
            locked: Decimal::new(50, 0),
            ..Balance::default()
        };
        assert_eq!(bal.total(), Decimal::new(150, 0));
        assert!(!bal.is_zero());
    }

    #[test]
    fn balance_serde_roundtrip() {
        let bal = Balance {
            available: Decimal::new(12345, 2), // 123.45
            locked: Decimal::new(678, 1),      // 67.8
            ..Balance::new("Bitcoin", "https://img.example/btc.png")
        };
        let json = serde_json::to_string(&bal).unwrap();
        let back: Balance = serde_json::from_str(&json).unwrap();
        assert_eq!(bal, back);
    }
}
