//! Escrowed order engine.
//!
//! Drives the `Pending -> Processing -> Completed` state machine over
//! orders created against advertisements, with cancellation and dispute
//! reachable from both non-terminal states.
//!
//! Escrow model: the seller's asset is held at order creation and either
//! consumed (completion) or released (cancellation). The capacity
//! decrement, counter bump, and escrow hold at creation happen under the
//! advertisement's own lock, so the multi-field update is one logical
//! unit with no partial application.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use swapdesk_ledger::EventApplier;
use swapdesk_types::{
    AdSide, AdvertisementId, ChatMessage, EventKey, EventKind, Order, OrderId, OrderStatus,
    Result, SwapdeskError, UserId,
};
use tracing::info;

use crate::ads::AdvertisementBook;

/// The order engine: owns the order map and performs every status
/// transition on behalf of an authenticated participant.
pub struct OrderEngine {
    ads: Arc<AdvertisementBook>,
    ledger: Arc<EventApplier>,
    orders: DashMap<OrderId, Arc<Mutex<Order>>>,
}

impl OrderEngine {
    #[must_use]
    pub fn new(ads: Arc<AdvertisementBook>, ledger: Arc<EventApplier>) -> Self {
        Self {
            ads,
            ledger,
            orders: DashMap::new(),
        }
    }

    /// Create an order against an advertisement.
    ///
    /// Validates the fiat amount against the ad's min/max and remaining
    /// capacity, freezes the unit price, assigns buyer/seller from the
    /// ad side, escrows the seller's asset, and decrements the ad's
    /// capacity, all under the advertisement's lock.
    ///
    /// # Errors
    /// - `AdvertisementNotFound` / `AdvertisementInactive`
    /// - `Validation` for an out-of-range or over-capacity amount
    /// - `InsufficientBalance` if the seller cannot cover the escrow
    pub fn create_order(
        &self,
        ad_id: AdvertisementId,
        taker: UserId,
        fiat_amount: Decimal,
    ) -> Result<Order> {
        let handle = self
            .ads
            .handle(ad_id)
            .ok_or(SwapdeskError::AdvertisementNotFound(ad_id))?;
        let mut ad = handle.lock();

        if !ad.accepts_orders() {
            return Err(SwapdeskError::AdvertisementInactive(ad_id));
        }
        if fiat_amount < ad.min_amount || fiat_amount > ad.max_amount {
            return Err(SwapdeskError::validation(format!(
                "amount {fiat_amount} outside [{}, {}]",
                ad.min_amount, ad.max_amount
            )));
        }
        if fiat_amount > ad.available_amount {
            return Err(SwapdeskError::validation(format!(
                "amount {fiat_amount} exceeds remaining capacity {}",
                ad.available_amount
            )));
        }
        if ad.merchant == taker {
            return Err(SwapdeskError::validation(
                "merchant cannot take their own advertisement",
            ));
        }

        // Price frozen at this instant; later ad edits never touch it.
        let price = ad.price;
        let asset_amount = fiat_amount / price;

        let (buyer, seller) = match ad.side {
            AdSide::Sell => (taker, ad.merchant),
            AdSide::Buy => (ad.merchant, taker),
        };

        // Escrow before touching the ad: a failed hold leaves everything
        // unchanged.
        self.ledger.hold(seller, &ad.asset, asset_amount)?;

        ad.available_amount -= fiat_amount;
        ad.total_orders += 1;
        ad.recompute_success_rate();

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            advertisement_id: ad_id,
            buyer,
            seller,
            asset: ad.asset.clone(),
            fiat_amount,
            asset_amount,
            price,
            terms: ad.terms.clone(),
            status: OrderStatus::Pending,
            expires_at: now + ad.response_time(),
            chat: Vec::new(),
            dispute_reason: None,
            created_at: now,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            disputed_at: None,
        };
        info!(order = %order.id, ad = %ad_id, %fiat_amount, %asset_amount, "order created");
        self.orders
            .insert(order.id, Arc::new(Mutex::new(order.clone())));
        Ok(order)
    }

    /// Buyer marks the fiat payment as sent: `Pending -> Processing`.
    ///
    /// # Errors
    /// `OrderNotFound`, `Unauthorized` (not the buyer), or
    /// `InvalidOrderTransition` if not pending.
    pub fn mark_payment_sent(&self, order_id: OrderId, actor: UserId) -> Result<Order> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock();
        if actor != order.buyer {
            return Err(SwapdeskError::unauthorized(
                "only the buyer may mark payment sent",
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(Self::bad_transition(order.status, OrderStatus::Processing));
        }
        order.status = OrderStatus::Processing;
        order.paid_at = Some(Utc::now());
        Ok(order.clone())
    }

    /// Transition an order to a terminal status on behalf of a
    /// participant.
    ///
    /// - `Completed`: consumes the seller's escrow and credits the buyer
    ///   (idempotency keys derived from the order id), bumps the ad's
    ///   completed counter.
    /// - `Cancelled`: releases the escrow and refunds the ad's capacity.
    /// - `Disputed`: records the reason; funds stay escrowed for admin
    ///   resolution.
    ///
    /// # Errors
    /// `OrderNotFound`, `Unauthorized` (not a participant),
    /// `Validation` (non-terminal target), or `InvalidOrderTransition`
    /// from a terminal state.
    pub fn update_status(
        &self,
        order_id: OrderId,
        actor: UserId,
        target: OrderStatus,
        dispute_reason: Option<String>,
    ) -> Result<Order> {
        if !target.is_terminal() {
            return Err(SwapdeskError::validation(format!(
                "target status {target} is not a terminal state"
            )));
        }

        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock();
        if !order.is_participant(actor) {
            return Err(SwapdeskError::unauthorized(
                "only the buyer or seller may update this order",
            ));
        }
        if order.status.is_terminal() {
            return Err(Self::bad_transition(order.status, target));
        }

        let now = Utc::now();
        match target {
            OrderStatus::Completed => {
                let release_key = EventKey::new(format!("ord-{}-release", order.id));
                let receive_key = EventKey::new(format!("ord-{}-receive", order.id));
                self.ledger.settle_hold(
                    order.seller,
                    &order.asset,
                    order.asset_amount,
                    release_key,
                    EventKind::TradeRelease,
                )?;
                self.ledger.apply(
                    order.buyer,
                    &order.asset,
                    order.asset_amount,
                    receive_key,
                    EventKind::TradeReceive,
                )?;
                order.status = OrderStatus::Completed;
                order.completed_at = Some(now);
            }
            OrderStatus::Cancelled => {
                self.ledger
                    .release_hold(order.seller, &order.asset, order.asset_amount)?;
                order.status = OrderStatus::Cancelled;
                order.cancelled_at = Some(now);
            }
            OrderStatus::Disputed => {
                order.status = OrderStatus::Disputed;
                order.disputed_at = Some(now);
                order.dispute_reason = dispute_reason;
            }
            OrderStatus::Pending | OrderStatus::Processing => unreachable!("checked above"),
        }
        info!(order = %order.id, status = %order.status, "order transition");

        self.bump_ad_counters(&order, target);
        Ok(order.clone())
    }

    /// Append a chat message. Participants only, and only while the
    /// order is non-terminal: a closed trade's thread is closed too.
    ///
    /// # Errors
    /// `OrderNotFound`, `Unauthorized`, or `Validation` on a terminal
    /// order.
    pub fn append_chat(&self, order_id: OrderId, actor: UserId, body: String) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock();
        if !order.is_participant(actor) {
            return Err(SwapdeskError::unauthorized(
                "only the buyer or seller may chat on this order",
            ));
        }
        if order.status.is_terminal() {
            return Err(SwapdeskError::validation(
                "chat thread is closed on a terminal order",
            ));
        }
        order.chat.push(ChatMessage {
            sender: actor,
            body,
            sent_at: Utc::now(),
        });
        Ok(())
    }

    /// Snapshot of an order.
    ///
    /// # Errors
    /// `OrderNotFound` if missing.
    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.order_handle(order_id)?.lock().clone())
    }

    /// A user's orders (as buyer or seller), oldest first.
    #[must_use]
    pub fn orders_for(&self, user_id: UserId) -> Vec<Order> {
        let mut out: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().lock().clone())
            .filter(|order| order.is_participant(user_id))
            .collect();
        out.sort_by_key(|order| order.created_at);
        out
    }

    fn order_handle(&self, order_id: OrderId) -> Result<Arc<Mutex<Order>>> {
        self.orders
            .get(&order_id)
            .map(|entry| entry.clone())
            .ok_or(SwapdeskError::OrderNotFound(order_id))
    }

    fn bump_ad_counters(&self, order: &Order, target: OrderStatus) {
        // The ad may be soft-deleted by now; handle() still resolves it.
        if let Some(handle) = self.ads.handle(order.advertisement_id) {
            let mut ad = handle.lock();
            match target {
                OrderStatus::Completed => ad.completed_orders += 1,
                OrderStatus::Cancelled => {
                    ad.cancelled_orders += 1;
                    // Cancelled capacity flows back into the ad.
                    ad.available_amount += order.fiat_amount;
                }
                OrderStatus::Disputed => ad.disputed_orders += 1,
                OrderStatus::Pending | OrderStatus::Processing => {}
            }
            ad.recompute_success_rate();
        }
    }

    fn bad_transition(from: OrderStatus, to: OrderStatus) -> SwapdeskError {
        SwapdeskError::InvalidOrderTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
