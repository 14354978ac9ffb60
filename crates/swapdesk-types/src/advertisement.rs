//! Merchant advertisement types for the P2P market.
//!
//! An advertisement is a merchant's standing offer to buy or sell an
//! asset at a fixed unit price. Its `available_amount` is consumed as
//! orders are created against it and refunded when they cancel. An
//! advertisement referenced by any order is never physically deleted,
//! only soft-deleted.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AdvertisementId, Asset, UserId};

/// Which side of the market the merchant is on.
///
/// A `Sell` advertisement means the merchant sells the asset: the taker
/// who joins it is the buyer. A `Buy` advertisement is the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdSide {
    Buy,
    Sell,
}

impl std::fmt::Display for AdSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A merchant's standing buy/sell offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: AdvertisementId,
    pub merchant: UserId,
    pub side: AdSide,
    pub asset: Asset,
    /// Unit price in fiat per asset unit. Orders snapshot this value.
    pub price: Decimal,
    /// Minimum fiat order size.
    pub min_amount: Decimal,
    /// Maximum fiat order size.
    pub max_amount: Decimal,
    /// Remaining fiat capacity. Decremented on order creation, refunded
    /// on cancellation.
    pub available_amount: Decimal,
    /// Response-time SLA in seconds; new orders expire after this long.
    pub response_time_secs: i64,
    /// Trade terms, snapshotted onto orders at creation.
    pub terms: String,
    pub total_orders: u64,
    pub completed_orders: u64,
    pub cancelled_orders: u64,
    pub disputed_orders: u64,
    /// `completed_orders / total_orders * 100`, recomputed on terminal
    /// order transitions.
    pub success_rate: Decimal,
    pub active: bool,
    /// Soft-delete flag. A referenced advertisement is never removed.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Advertisement {
    /// Response-time SLA as a duration.
    #[must_use]
    pub fn response_time(&self) -> Duration {
        Duration::seconds(self.response_time_secs)
    }

    /// Whether the advertisement currently accepts new orders.
    #[must_use]
    pub fn accepts_orders(&self) -> bool {
        self.active && !self.deleted
    }

    /// Recompute the success rate from the order counters.
    pub fn recompute_success_rate(&mut self) {
        self.success_rate = if self.total_orders == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(self.completed_orders) / Decimal::from(self.total_orders)
                * Decimal::ONE_HUNDRED
        };
    }
}

/// Test helpers.
#[cfg(test)]
impl Advertisement {
    pub fn dummy(side: AdSide, price: Decimal, available: Decimal) -> Self {
        Self::dummy_for_merchant(UserId::new(), side, price, available)
    }

    pub fn dummy_for_merchant(
        merchant: UserId,
        side: AdSide,
        price: Decimal,
        available: Decimal,
    ) -> Self {
        Self {
            id: AdvertisementId::new(),
            merchant,
            side,
            asset: "BTC".to_string(),
            price,
            min_amount: Decimal::new(10, 0),
            max_amount: Decimal::new(1000, 0),
            available_amount: available,
            response_time_secs: 900,
            terms: "Payment within 15 minutes.".to_string(),
            total_orders: 0,
            completed_orders: 0,
            cancelled_orders: 0,
            disputed_orders: 0,
            success_rate: Decimal::ZERO,
            active: true,
            deleted: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_side_display() {
        assert_eq!(format!("{}", AdSide::Buy), "BUY");
        assert_eq!(format!("{}", AdSide::Sell), "SELL");
    }

    #[test]
    fn success_rate_zero_orders() {
        let mut ad = Advertisement::dummy(AdSide::Sell, Decimal::TWO, Decimal::new(1000, 0));
        ad.recompute_success_rate();
        assert_eq!(ad.success_rate, Decimal::ZERO);
    }

    #[test]
    fn success_rate_recompute() {
        let mut ad = Advertisement::dummy(AdSide::Sell, Decimal::TWO, Decimal::new(1000, 0));
        ad.total_orders = 4;
        ad.completed_orders = 3;
        ad.recompute_success_rate();
        assert_eq!(ad.success_rate, Decimal::new(75, 0));
    }

    #[test]
    fn accepts_orders_flags() {
        let mut ad = Advertisement::dummy(AdSide::Buy, Decimal::ONE, Decimal::new(100, 0));
        assert!(ad.accepts_orders());
        ad.active = false;
        assert!(!ad.accepts_orders());
        ad.active = true;
        ad.deleted = true;
        assert!(!ad.accepts_orders());
    }
}
