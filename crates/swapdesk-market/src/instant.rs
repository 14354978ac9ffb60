//! Instant-match trade engine.
//!
//! A second, simpler state machine (`Pending -> PaymentSent ->
//! Completed`) that bypasses the escrowed order flow: balances move
//! synchronously when the seller releases. Deliberately kept separate
//! from [`crate::OrderEngine`]: the two paths implement different
//! trust models and must not be unified.
//!
//! Release uses transient holds on both legs so the fiat and asset
//! movements land all-or-nothing even though the trade itself carries
//! no standing escrow.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use swapdesk_ledger::EventApplier;
use swapdesk_types::{
    AdSide, AdvertisementId, Asset, EventKey, EventKind, InstantStatus, InstantTrade, Result,
    SwapdeskError, TradeId, UserId,
};
use tracing::info;

use crate::ads::AdvertisementBook;

/// Synchronous trade execution against an advertisement, no escrow step.
pub struct InstantMatchEngine {
    ads: Arc<AdvertisementBook>,
    ledger: Arc<EventApplier>,
    trades: DashMap<TradeId, Arc<Mutex<InstantTrade>>>,
    /// The platform fiat asset the buyer pays with.
    fiat_asset: Asset,
}

impl InstantMatchEngine {
    #[must_use]
    pub fn new(
        ads: Arc<AdvertisementBook>,
        ledger: Arc<EventApplier>,
        fiat_asset: impl Into<Asset>,
    ) -> Self {
        Self {
            ads,
            ledger,
            trades: DashMap::new(),
            fiat_asset: fiat_asset.into(),
        }
    }

    /// Join an advertisement for a synchronous trade.
    ///
    /// Performs the two-sided balance check (buyer's fiat vs seller's
    /// asset) up front; nothing moves until the seller releases.
    ///
    /// # Errors
    /// - `AdvertisementNotFound` / `AdvertisementInactive`
    /// - `Validation` for an out-of-range or over-capacity amount
    /// - `InsufficientBalance` if either side cannot cover the trade
    pub fn join_ad(
        &self,
        ad_id: AdvertisementId,
        taker: UserId,
        fiat_amount: Decimal,
    ) -> Result<InstantTrade> {
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

        let price = ad.price;
        let asset_amount = fiat_amount / price;
        let (buyer, seller) = match ad.side {
            AdSide::Sell => (taker, ad.merchant),
            AdSide::Buy => (ad.merchant, taker),
        };

        // Two-sided check: buyer's fiat vs seller's asset.
        let buyer_fiat = self.ledger.balance(buyer, &self.fiat_asset).available;
        if buyer_fiat < fiat_amount {
            return Err(SwapdeskError::InsufficientBalance {
                needed: fiat_amount,
                available: buyer_fiat,
            });
        }
        let seller_asset = self.ledger.balance(seller, &ad.asset).available;
        if seller_asset < asset_amount {
            return Err(SwapdeskError::InsufficientBalance {
                needed: asset_amount,
                available: seller_asset,
            });
        }

        ad.available_amount -= fiat_amount;

        let trade = InstantTrade {
            id: TradeId::new(),
            advertisement_id: ad_id,
            buyer,
            seller,
            asset: ad.asset.clone(),
            fiat_asset: self.fiat_asset.clone(),
            fiat_amount,
            asset_amount,
            price,
            status: InstantStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        info!(trade = %trade.id, ad = %ad_id, %fiat_amount, %asset_amount, "instant trade joined");
        self.trades
            .insert(trade.id, Arc::new(Mutex::new(trade.clone())));
        Ok(trade)
    }

    /// Buyer signals the fiat payment is on its way:
    /// `Pending -> PaymentSent`.
    ///
    /// # Errors
    /// `TradeNotFound`, `Unauthorized` (not the buyer), or `Validation`
    /// from any state but `Pending`.
    pub fn mark_payment_sent(&self, trade_id: TradeId, actor: UserId) -> Result<InstantTrade> {
        let handle = self.trade_handle(trade_id)?;
        let mut trade = handle.lock();
        if actor != trade.buyer {
            return Err(SwapdeskError::unauthorized(
                "only the buyer may mark payment sent",
            ));
        }
        if trade.status != InstantStatus::Pending {
            return Err(SwapdeskError::validation(format!(
                "cannot mark payment sent from {}",
                trade.status
            )));
        }
        trade.status = InstantStatus::PaymentSent;
        Ok(trade.clone())
    }

    /// Seller releases: `PaymentSent -> Completed`, moving fiat buyer →
    /// seller and asset seller → buyer synchronously.
    ///
    /// Both legs are re-checked and held before either settles, so a
    /// side that went broke since `join_ad` fails the release cleanly
    /// with no half-applied trade.
    ///
    /// # Errors
    /// `TradeNotFound`, `Unauthorized` (not the seller), `Validation`
    /// from any state but `PaymentSent`, or `InsufficientBalance` if a
    /// side can no longer cover its leg.
    pub fn release_coins(&self, trade_id: TradeId, actor: UserId) -> Result<InstantTrade> {
        let handle = self.trade_handle(trade_id)?;
        let mut trade = handle.lock();
        if actor != trade.seller {
            return Err(SwapdeskError::unauthorized(
                "only the seller may release coins",
            ));
        }
        if trade.status != InstantStatus::PaymentSent {
            return Err(SwapdeskError::validation(format!(
                "cannot release coins from {}",
                trade.status
            )));
        }

        // Re-validate both sides with transient holds; release the
        // first if the second fails.
        self.ledger
            .hold(trade.buyer, &trade.fiat_asset, trade.fiat_amount)?;
        if let Err(err) = self.ledger.hold(trade.seller, &trade.asset, trade.asset_amount) {
            self.ledger
                .release_hold(trade.buyer, &trade.fiat_asset, trade.fiat_amount)?;
            return Err(err);
        }

        // Both legs are locked; settlement cannot fail past this point.
        let fiat_key = EventKey::new(format!("im-{}-fiat", trade.id.0));
        let asset_key = EventKey::new(format!("im-{}-asset", trade.id.0));
        self.ledger.settle_hold(
            trade.buyer,
            &trade.fiat_asset,
            trade.fiat_amount,
            fiat_key.leg("debit"),
            EventKind::InstantDebit,
        )?;
        self.ledger.apply(
            trade.seller,
            &trade.fiat_asset,
            trade.fiat_amount,
            fiat_key.leg("credit"),
            EventKind::InstantCredit,
        )?;
        self.ledger.settle_hold(
            trade.seller,
            &trade.asset,
            trade.asset_amount,
            asset_key.leg("debit"),
            EventKind::InstantDebit,
        )?;
        self.ledger.apply(
            trade.buyer,
            &trade.asset,
            trade.asset_amount,
            asset_key.leg("credit"),
            EventKind::InstantCredit,
        )?;

        trade.status = InstantStatus::Completed;
        trade.completed_at = Some(Utc::now());
        info!(trade = %trade.id, "instant trade completed");
        Ok(trade.clone())
    }

    /// Snapshot of a trade.
    ///
    /// # Errors
    /// `TradeNotFound` if missing.
    pub fn trade(&self, trade_id: TradeId) -> Result<InstantTrade> {
        Ok(self.trade_handle(trade_id)?.lock().clone())
    }

    fn trade_handle(&self, trade_id: TradeId) -> Result<Arc<Mutex<InstantTrade>>> {
        self.trades
            .get(&trade_id)
            .map(|entry| entry.clone())
            .ok_or(SwapdeskError::TradeNotFound(trade_id))
    }
}
