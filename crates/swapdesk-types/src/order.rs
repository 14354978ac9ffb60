//! Escrowed P2P order types.
//!
//! An order is one trade instance against an advertisement. Price and
//! terms are snapshotted at creation and never change afterwards, even
//! if the merchant edits the advertisement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AdvertisementId, Asset, OrderId, UserId};

/// Lifecycle status of an order.
///
/// `Pending -> Processing -> Completed`, with cancellation and dispute
/// reachable from both non-terminal states. `Completed` and `Cancelled`
/// are terminal; `Disputed` is terminal for the engine (resolution is an
/// admin action outside this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    /// Whether the engine accepts further transitions from this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Disputed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Disputed => write!(f, "DISPUTED"),
        }
    }
}

/// One message in an order's chat thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// One trade instance created against an advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub advertisement_id: AdvertisementId,
    pub buyer: UserId,
    pub seller: UserId,
    pub asset: Asset,
    /// Fiat amount the buyer pays.
    pub fiat_amount: Decimal,
    /// Asset amount escrowed from the seller: `fiat_amount / price`.
    pub asset_amount: Decimal,
    /// Unit price frozen at order creation. Immune to later ad edits.
    pub price: Decimal,
    /// Advertisement terms snapshotted at creation.
    pub terms: String,
    pub status: OrderStatus,
    /// Creation time + the advertisement's response-time SLA.
    pub expires_at: DateTime<Utc>,
    pub chat: Vec<ChatMessage>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the given user is the buyer or the seller.
    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.buyer == user || self.seller == user
    }

    /// Whether the response-time SLA has lapsed.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(),
            advertisement_id: AdvertisementId::new(),
            buyer: UserId::new(),
            seller: UserId::new(),
            asset: "BTC".to_string(),
            fiat_amount: Decimal::new(100, 0),
            asset_amount: Decimal::new(50, 0),
            price: Decimal::TWO,
            terms: String::new(),
            status: OrderStatus::Pending,
            expires_at: Utc::now() + chrono::Duration::minutes(15),
            chat: Vec::new(),
            dispute_reason: None,
            created_at: Utc::now(),
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            disputed_at: None,
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Disputed.is_terminal());
    }

    #[test]
    fn participant_check() {
        let order = sample_order();
        assert!(order.is_participant(order.buyer));
        assert!(order.is_participant(order.seller));
        assert!(!order.is_participant(UserId::new()));
    }

    #[test]
    fn expiry_check() {
        let order = sample_order();
        assert!(!order.is_expired_at(Utc::now()));
        assert!(order.is_expired_at(Utc::now() + chrono::Duration::hours(1)));
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", OrderStatus::Processing), "PROCESSING");
        assert_eq!(format!("{}", OrderStatus::Disputed), "DISPUTED");
    }
}
