//! Per-(user, asset) account map.
//!
//! Each account is a [`Balance`] behind its own `parking_lot::Mutex`, so
//! operations on the *same* account serialize while operations on
//! different accounts proceed fully in parallel. Accounts are created
//! lazily on first credit and never deleted.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use swapdesk_types::{AccountKey, Asset, AssetInfo, Balance, UserId};

/// Concurrent account map keyed by (user, asset).
pub struct AccountBook {
    accounts: DashMap<AccountKey, Arc<Mutex<Balance>>>,
    /// Display metadata stamped onto lazily created balances.
    assets: DashMap<Asset, AssetInfo>,
}

impl AccountBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            assets: DashMap::new(),
        }
    }

    /// Register display metadata for an asset. Later-created balances
    /// for this asset carry the name/logo.
    pub fn register_asset(&self, info: AssetInfo) {
        self.assets.insert(info.symbol.clone(), info);
    }

    /// Whether an account exists for the pair.
    #[must_use]
    pub fn exists(&self, user_id: UserId, asset: &str) -> bool {
        self.accounts.contains_key(&(user_id, asset.to_string()))
    }

    /// Fetch the lock handle for an account, creating the account with a
    /// zero balance if it does not exist yet.
    ///
    /// The returned `Arc` is cloned out of the map so the map shard lock
    /// is not held while the caller holds the account mutex.
    pub fn handle(&self, user_id: UserId, asset: &str) -> Arc<Mutex<Balance>> {
        self.accounts
            .entry((user_id, asset.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(self.blank_balance(asset))))
            .clone()
    }

    /// Fetch the lock handle only if the account already exists.
    #[must_use]
    pub fn existing_handle(&self, user_id: UserId, asset: &str) -> Option<Arc<Mutex<Balance>>> {
        self.accounts
            .get(&(user_id, asset.to_string()))
            .map(|entry| entry.clone())
    }

    /// Snapshot of an account's balance, zero if the account does not exist.
    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.existing_handle(user_id, asset)
            .map_or_else(|| self.blank_balance(asset), |handle| handle.lock().clone())
    }

    /// Snapshots of all of a user's balances.
    #[must_use]
    pub fn balances_for(&self, user_id: UserId) -> Vec<(Asset, Balance)> {
        let mut out: Vec<(Asset, Balance)> = self
            .accounts
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| (entry.key().1.clone(), entry.value().lock().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Total supply of an asset across all users (available + locked).
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> rust_decimal::Decimal {
        self.accounts
            .iter()
            .filter(|entry| entry.key().1 == asset)
            .map(|entry| entry.value().lock().total())
            .sum()
    }

    fn blank_balance(&self, asset: &str) -> Balance {
        self.assets
            .get(asset)
            .map_or_else(Balance::default, |info| {
                Balance::new(info.name.clone(), info.logo.clone())
            })
    }
}

impl Default for AccountBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn nonexistent_balance_is_zero() {
        let book = AccountBook::new();
        let bal = book.balance(UserId::new(), "BTC");
        assert!(bal.is_zero());
        assert!(!book.exists(UserId::new(), "BTC"));
    }

    #[test]
    fn handle_creates_lazily() {
        let book = AccountBook::new();
        let user = UserId::new();
        assert!(!book.exists(user, "BTC"));
        let handle = book.handle(user, "BTC");
        handle.lock().available = Decimal::ONE;
        assert!(book.exists(user, "BTC"));
        assert_eq!(book.balance(user, "BTC").available, Decimal::ONE);
    }

    #[test]
    fn registered_asset_metadata_stamped() {
        let book = AccountBook::new();
        book.register_asset(AssetInfo::new("BTC", "Bitcoin", "https://img/btc.png"));
        let user = UserId::new();
        let _ = book.handle(user, "BTC");
        let bal = book.balance(user, "BTC");
        assert_eq!(bal.name, "Bitcoin");
        assert_eq!(bal.logo, "https://img/btc.png");
    }

    #[test]
    fn balances_for_lists_sorted() {
        let book = AccountBook::new();
        let user = UserId::new();
        book.handle(user, "USDT").lock().available = Decimal::new(10, 0);
        book.handle(user, "BTC").lock().available = Decimal::ONE;
        book.handle(UserId::new(), "BTC").lock().available = Decimal::ONE;

        let balances = book.balances_for(user);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].0, "BTC");
        assert_eq!(balances[1].0, "USDT");
    }

    #[test]
    fn total_supply_sums_all_users() {
        let book = AccountBook::new();
        let u1 = UserId::new();
        let u2 = UserId::new();
        book.handle(u1, "USDT").lock().available = Decimal::new(1000, 0);
        {
            let handle = book.handle(u2, "USDT");
            let mut bal = handle.lock();
            bal.available = Decimal::new(200, 0);
            bal.locked = Decimal::new(300, 0);
        }
        assert_eq!(book.total_supply("USDT"), Decimal::new(1500, 0));
    }
}
