//! Advertisement book.
//!
//! Merchants post standing buy/sell offers; each advertisement lives
//! behind its own mutex so the order engine can update its capacity and
//! counters as one unit. Advertisements are soft-deleted only, since an
//! ad referenced by an order must stay resolvable.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use swapdesk_types::{
    AdSide, Advertisement, AdvertisementId, Asset, Result, SwapdeskError, UserId,
};
use tracing::info;

/// Parameters for posting a new advertisement.
#[derive(Debug, Clone)]
pub struct NewAdvertisement {
    pub merchant: UserId,
    pub side: AdSide,
    pub asset: Asset,
    pub price: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub available_amount: Decimal,
    pub response_time_secs: i64,
    pub terms: String,
}

/// Concurrent store of merchant advertisements.
pub struct AdvertisementBook {
    ads: DashMap<AdvertisementId, Arc<Mutex<Advertisement>>>,
}

impl AdvertisementBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ads: DashMap::new(),
        }
    }

    /// Post a new advertisement, active immediately.
    ///
    /// # Errors
    /// Returns `Validation` for a non-positive price, an empty or
    /// inverted min/max range, or capacity below the minimum order size.
    pub fn post(&self, new: NewAdvertisement) -> Result<AdvertisementId> {
        if new.price <= Decimal::ZERO {
            return Err(SwapdeskError::validation("price must be positive"));
        }
        if new.min_amount <= Decimal::ZERO || new.min_amount > new.max_amount {
            return Err(SwapdeskError::validation(
                "order size range must satisfy 0 < min <= max",
            ));
        }
        if new.available_amount < new.min_amount {
            return Err(SwapdeskError::validation(
                "available amount below minimum order size",
            ));
        }
        if new.response_time_secs <= 0 {
            return Err(SwapdeskError::validation("response time must be positive"));
        }

        let ad = Advertisement {
            id: AdvertisementId::new(),
            merchant: new.merchant,
            side: new.side,
            asset: new.asset,
            price: new.price,
            min_amount: new.min_amount,
            max_amount: new.max_amount,
            available_amount: new.available_amount,
            response_time_secs: new.response_time_secs,
            terms: new.terms,
            total_orders: 0,
            completed_orders: 0,
            cancelled_orders: 0,
            disputed_orders: 0,
            success_rate: Decimal::ZERO,
            active: true,
            deleted: false,
            created_at: Utc::now(),
        };
        let id = ad.id;
        info!(%id, merchant = %ad.merchant, side = %ad.side, "advertisement posted");
        self.ads.insert(id, Arc::new(Mutex::new(ad)));
        Ok(id)
    }

    /// Snapshot of an advertisement. Soft-deleted ads are not visible here.
    ///
    /// # Errors
    /// Returns `AdvertisementNotFound` if missing or deleted.
    pub fn get(&self, id: AdvertisementId) -> Result<Advertisement> {
        let handle = self
            .ads
            .get(&id)
            .ok_or(SwapdeskError::AdvertisementNotFound(id))?;
        let ad = handle.lock().clone();
        if ad.deleted {
            return Err(SwapdeskError::AdvertisementNotFound(id));
        }
        Ok(ad)
    }

    /// Flip an advertisement inactive. Merchant action only.
    ///
    /// # Errors
    /// `AdvertisementNotFound` if missing; `Unauthorized` if the actor
    /// is not the posting merchant.
    pub fn deactivate(&self, id: AdvertisementId, actor: UserId) -> Result<()> {
        let handle = self
            .ads
            .get(&id)
            .ok_or(SwapdeskError::AdvertisementNotFound(id))?;
        let mut ad = handle.lock();
        if ad.merchant != actor {
            return Err(SwapdeskError::unauthorized(
                "only the posting merchant may deactivate an advertisement",
            ));
        }
        ad.active = false;
        Ok(())
    }

    /// Soft-delete an advertisement. The record stays resolvable for
    /// existing orders but disappears from [`Self::get`].
    ///
    /// # Errors
    /// `AdvertisementNotFound` if missing; `Unauthorized` if the actor
    /// is not the posting merchant.
    pub fn soft_delete(&self, id: AdvertisementId, actor: UserId) -> Result<()> {
        let handle = self
            .ads
            .get(&id)
            .ok_or(SwapdeskError::AdvertisementNotFound(id))?;
        let mut ad = handle.lock();
        if ad.merchant != actor {
            return Err(SwapdeskError::unauthorized(
                "only the posting merchant may delete an advertisement",
            ));
        }
        ad.active = false;
        ad.deleted = true;
        Ok(())
    }

    /// Active, non-deleted advertisements for an asset.
    #[must_use]
    pub fn active_for_asset(&self, asset: &str) -> Vec<Advertisement> {
        let mut out: Vec<Advertisement> = self
            .ads
            .iter()
            .map(|entry| entry.value().lock().clone())
            .filter(|ad| ad.accepts_orders() && ad.asset == asset)
            .collect();
        out.sort_by_key(|ad| ad.created_at);
        out
    }

    /// Lock handle for engine-internal capacity/counter updates.
    /// Resolves soft-deleted ads too: counters on referenced ads must
    /// stay reachable.
    pub(crate) fn handle(&self, id: AdvertisementId) -> Option<Arc<Mutex<Advertisement>>> {
        self.ads.get(&id).map(|entry| entry.clone())
    }
}

impl Default for AdvertisementBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sell_ad(merchant: UserId) -> NewAdvertisement {
        NewAdvertisement {
            merchant,
            side: AdSide::Sell,
            asset: "BTC".to_string(),
            price: Decimal::TWO,
            min_amount: Decimal::new(10, 0),
            max_amount: Decimal::new(1000, 0),
            available_amount: Decimal::new(1000, 0),
            response_time_secs: 900,
            terms: "Pay within 15 minutes.".to_string(),
        }
    }

    #[test]
    fn post_and_get() {
        let book = AdvertisementBook::new();
        let merchant = UserId::new();
        let id = book.post(sell_ad(merchant)).unwrap();
        let ad = book.get(id).unwrap();
        assert_eq!(ad.merchant, merchant);
        assert!(ad.accepts_orders());
        assert_eq!(ad.available_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn post_rejects_bad_price() {
        let book = AdvertisementBook::new();
        let mut new = sell_ad(UserId::new());
        new.price = Decimal::ZERO;
        let err = book.post(new).unwrap_err();
        assert!(matches!(err, SwapdeskError::Validation { .. }));
    }

    #[test]
    fn post_rejects_inverted_range() {
        let book = AdvertisementBook::new();
        let mut new = sell_ad(UserId::new());
        new.min_amount = Decimal::new(2000, 0);
        let err = book.post(new).unwrap_err();
        assert!(matches!(err, SwapdeskError::Validation { .. }));
    }

    #[test]
    fn deactivate_requires_merchant() {
        let book = AdvertisementBook::new();
        let merchant = UserId::new();
        let id = book.post(sell_ad(merchant)).unwrap();

        let err = book.deactivate(id, UserId::new()).unwrap_err();
        assert!(matches!(err, SwapdeskError::Unauthorized { .. }));

        book.deactivate(id, merchant).unwrap();
        assert!(!book.get(id).unwrap().accepts_orders());
    }

    #[test]
    fn soft_delete_hides_from_get() {
        let book = AdvertisementBook::new();
        let merchant = UserId::new();
        let id = book.post(sell_ad(merchant)).unwrap();
        book.soft_delete(id, merchant).unwrap();

        let err = book.get(id).unwrap_err();
        assert!(matches!(err, SwapdeskError::AdvertisementNotFound(_)));
        // Still resolvable internally for referenced orders.
        assert!(book.handle(id).is_some());
    }

    #[test]
    fn active_listing_excludes_inactive() {
        let book = AdvertisementBook::new();
        let merchant = UserId::new();
        let keep = book.post(sell_ad(merchant)).unwrap();
        let drop = book.post(sell_ad(merchant)).unwrap();
        book.deactivate(drop, merchant).unwrap();

        let listed = book.active_for_asset("BTC");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep);
    }
}
