//! Instant-match trade types.
//!
//! The instant-match path bypasses the escrowed [`crate::Order`] flow
//! entirely: balances move synchronously when the seller releases. It is
//! a deliberately separate, simpler state machine
//! (`Pending -> PaymentSent -> Completed`) and must not be unified with
//! the order engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AdvertisementId, Asset, TradeId, UserId};

/// Lifecycle status of an instant-match trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstantStatus {
    Pending,
    PaymentSent,
    Completed,
}

impl std::fmt::Display for InstantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PaymentSent => write!(f, "PAYMENT_SENT"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// One synchronous trade executed against an advertisement without escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantTrade {
    pub id: TradeId,
    pub advertisement_id: AdvertisementId,
    pub buyer: UserId,
    pub seller: UserId,
    pub asset: Asset,
    /// Fiat asset the buyer pays with (e.g., "NGN").
    pub fiat_asset: Asset,
    pub fiat_amount: Decimal,
    /// `fiat_amount / price`, frozen at match time.
    pub asset_amount: Decimal,
    pub price: Decimal,
    pub status: InstantStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InstantTrade {
    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.buyer == user || self.seller == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", InstantStatus::Pending), "PENDING");
        assert_eq!(format!("{}", InstantStatus::PaymentSent), "PAYMENT_SENT");
        assert_eq!(format!("{}", InstantStatus::Completed), "COMPLETED");
    }

    #[test]
    fn instant_trade_serde_roundtrip() {
        let trade = InstantTrade {
            id: TradeId::new(),
            advertisement_id: AdvertisementId::new(),
            buyer: UserId::new(),
            seller: UserId::new(),
            asset: "BTC".to_string(),
            fiat_asset: "NGN".to_string(),
            fiat_amount: Decimal::new(100, 0),
            asset_amount: Decimal::new(50, 0),
            price: Decimal::TWO,
            status: InstantStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        let json = serde_json::to_string(&trade).unwrap();
        let back: InstantTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.id, back.id);
        assert_eq!(trade.asset_amount, back.asset_amount);
    }
}
