//! Idempotent event applier, the only component that mutates balances.
//!
//! Every value-changing operation goes through [`EventApplier::apply`]
//! (or its escrow variants), keyed by a caller-supplied idempotency
//! [`EventKey`]. A key that has already been applied is absorbed
//! silently: the call succeeds and returns the current balance without
//! a second mutation.
//!
//! Atomicity: the balance read-modify-write and the event insert happen
//! under the account's own mutex, and the key is re-checked under that
//! lock, so concurrent calls for the same key or the same (user, asset)
//! pair cannot interleave into a lost update. Calls for different
//! accounts never contend.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use swapdesk_types::{
    Asset, AssetInfo, Balance, EventKey, EventKind, LedgerEvent, Result, SwapdeskError, UserId,
};
use tracing::debug;

use crate::accounts::AccountBook;

/// Applies value-changing events to the account book exactly once per key.
pub struct EventApplier {
    accounts: AccountBook,
    /// Applied events by idempotency key. Insert-only.
    events: DashMap<EventKey, LedgerEvent>,
}

impl EventApplier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: AccountBook::new(),
            events: DashMap::new(),
        }
    }

    /// Register display metadata for an asset.
    pub fn register_asset(&self, info: AssetInfo) {
        self.accounts.register_asset(info);
    }

    /// Apply a signed amount (positive credit, negative debit) to the
    /// account, exactly once per `key`.
    ///
    /// Replaying an applied key returns the current balance as success.
    /// A first-ever credit creates the account lazily.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if a debit would drive `available`
    /// below zero; neither the balance nor the event is written.
    pub fn apply(
        &self,
        user_id: UserId,
        asset: &str,
        amount: Decimal,
        key: EventKey,
        kind: EventKind,
    ) -> Result<Balance> {
        // Fast path: key already applied.
        if self.events.contains_key(&key) {
            debug!(%key, "duplicate event absorbed");
            return Ok(self.accounts.balance(user_id, asset));
        }

        // A debit against an account that was never credited cannot
        // succeed; avoid creating an empty record for it.
        if amount < Decimal::ZERO && !self.accounts.exists(user_id, asset) {
            return Err(SwapdeskError::InsufficientBalance {
                needed: -amount,
                available: Decimal::ZERO,
            });
        }

        let handle = self.accounts.handle(user_id, asset);
        let mut balance = handle.lock();

        // Re-check under the account lock: a concurrent call with the
        // same key serializes here, and the loser sees the event.
        if self.events.contains_key(&key) {
            debug!(%key, "duplicate event absorbed under lock");
            return Ok(balance.clone());
        }

        let next = balance.available + amount;
        if next < Decimal::ZERO {
            return Err(SwapdeskError::InsufficientBalance {
                needed: -amount,
                available: balance.available,
            });
        }

        balance.available = next;
        balance.updated_at = Utc::now();
        self.record_event(user_id, asset, amount, key, kind);
        Ok(balance.clone())
    }

    /// Move funds from `available` to `locked` (escrow).
    ///
    /// Not keyed: holds are transient and always paired with a later
    /// [`Self::settle_hold`] or [`Self::release_hold`].
    ///
    /// # Errors
    /// Returns `BalanceNotFound` if the account was never credited, or
    /// `InsufficientBalance` if available < amount.
    pub fn hold(&self, user_id: UserId, asset: &str, amount: Decimal) -> Result<Balance> {
        let handle = self
            .accounts
            .existing_handle(user_id, asset)
            .ok_or_else(|| SwapdeskError::BalanceNotFound {
                asset: asset.to_string(),
            })?;
        let mut balance = handle.lock();
        if balance.available < amount {
            return Err(SwapdeskError::InsufficientBalance {
                needed: amount,
                available: balance.available,
            });
        }
        balance.available -= amount;
        balance.locked += amount;
        balance.updated_at = Utc::now();
        Ok(balance.clone())
    }

    /// Move funds back from `locked` to `available` (escrow released).
    ///
    /// # Errors
    /// Returns `InsufficientLocked` if locked < amount.
    pub fn release_hold(&self, user_id: UserId, asset: &str, amount: Decimal) -> Result<Balance> {
        let handle = self
            .accounts
            .existing_handle(user_id, asset)
            .ok_or(SwapdeskError::InsufficientLocked)?;
        let mut balance = handle.lock();
        if balance.locked < amount {
            return Err(SwapdeskError::InsufficientLocked);
        }
        balance.locked -= amount;
        balance.available += amount;
        balance.updated_at = Utc::now();
        Ok(balance.clone())
    }

    /// Consume `locked` funds and write the debit event, exactly once
    /// per `key`. The settlement counterpart of [`Self::hold`].
    ///
    /// # Errors
    /// Returns `InsufficientLocked` if locked < amount.
    pub fn settle_hold(
        &self,
        user_id: UserId,
        asset: &str,
        amount: Decimal,
        key: EventKey,
        kind: EventKind,
    ) -> Result<Balance> {
        if self.events.contains_key(&key) {
            debug!(%key, "duplicate settlement absorbed");
            return Ok(self.accounts.balance(user_id, asset));
        }

        let handle = self
            .accounts
            .existing_handle(user_id, asset)
            .ok_or(SwapdeskError::InsufficientLocked)?;
        let mut balance = handle.lock();

        if self.events.contains_key(&key) {
            return Ok(balance.clone());
        }
        if balance.locked < amount {
            return Err(SwapdeskError::InsufficientLocked);
        }

        balance.locked -= amount;
        balance.updated_at = Utc::now();
        self.record_event(user_id, asset, -amount, key, kind);
        Ok(balance.clone())
    }

    /// One debit + one credit as a unit: `amount` of `asset` moves from
    /// `from` to `to`. Leg keys are derived (`{key}:debit`, `{key}:credit`)
    /// so a replay after a partial application finishes the credit leg
    /// instead of double-debiting.
    ///
    /// # Errors
    /// - `Validation` if amount ≤ 0
    /// - `InsufficientBalance` if the debit side cannot cover it
    pub fn transfer(
        &self,
        from: UserId,
        to: UserId,
        asset: &str,
        amount: Decimal,
        key: &EventKey,
        kind_out: EventKind,
        kind_in: EventKind,
    ) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(SwapdeskError::validation("transfer amount must be positive"));
        }
        self.apply(from, asset, -amount, key.leg("debit"), kind_out)?;
        self.apply(to, asset, amount, key.leg("credit"), kind_in)?;
        Ok(())
    }

    /// Snapshot of a (user, asset) balance; zero if never credited.
    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.accounts.balance(user_id, asset)
    }

    /// Snapshots of all of a user's balances, sorted by asset.
    #[must_use]
    pub fn balances_for(&self, user_id: UserId) -> Vec<(Asset, Balance)> {
        self.accounts.balances_for(user_id)
    }

    /// Whether an event with this key has been applied.
    #[must_use]
    pub fn has_event(&self, key: &EventKey) -> bool {
        self.events.contains_key(key)
    }

    /// Look up an applied event by key.
    #[must_use]
    pub fn event(&self, key: &EventKey) -> Option<LedgerEvent> {
        self.events.get(key).map(|entry| entry.clone())
    }

    /// All applied events for a user, oldest first.
    #[must_use]
    pub fn events_for(&self, user_id: UserId) -> Vec<LedgerEvent> {
        let mut out: Vec<LedgerEvent> = self
            .events
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|event| event.created_at);
        out
    }

    /// Total supply of an asset across all users.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Decimal {
        self.accounts.total_supply(asset)
    }

    fn record_event(
        &self,
        user_id: UserId,
        asset: &str,
        amount: Decimal,
        key: EventKey,
        kind: EventKind,
    ) {
        debug!(%key, %kind, %amount, "ledger event applied");
        self.events.insert(
            key.clone(),
            LedgerEvent {
                key,
                user_id,
                asset: asset.to_string(),
                amount,
                kind,
                created_at: Utc::now(),
            },
        );
    }
}

impl Default for EventApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn credit_creates_account_lazily() {
        let applier = EventApplier::new();
        let user = UserId::new();
        let bal = applier
            .apply(user, "BTC", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        assert_eq!(bal.available, dec(100));
        assert_eq!(bal.locked, Decimal::ZERO);
    }

    #[test]
    fn duplicate_key_is_noop_success() {
        // Scenario A: credit 100 twice with key "dep-1" -> balance is 100.
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        let bal = applier
            .apply(user, "BTC", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        assert_eq!(bal.available, dec(100));
        assert_eq!(applier.events_for(user).len(), 1);
    }

    #[test]
    fn distinct_keys_double_the_effect() {
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        let bal = applier
            .apply(user, "BTC", dec(100), EventKey::new("dep-2"), EventKind::Deposit)
            .unwrap();
        assert_eq!(bal.available, dec(200));
    }

    #[test]
    fn overdraw_rejected_balance_unchanged() {
        // Scenario B: available 50, debit 70 -> InsufficientBalance, still 50.
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "X", dec(50), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();

        let err = applier
            .apply(user, "X", dec(-70), EventKey::new("wd-1"), EventKind::Withdrawal)
            .unwrap_err();
        assert!(matches!(err, SwapdeskError::InsufficientBalance { .. }));
        assert_eq!(applier.balance(user, "X").available, dec(50));
        // The failed debit must not have written an event either.
        assert!(!applier.has_event(&EventKey::new("wd-1")));
    }

    #[test]
    fn debit_on_unknown_account_rejected_without_creating_it() {
        let applier = EventApplier::new();
        let user = UserId::new();
        let err = applier
            .apply(user, "BTC", dec(-1), EventKey::new("wd-1"), EventKind::Withdrawal)
            .unwrap_err();
        assert!(matches!(err, SwapdeskError::InsufficientBalance { .. }));
        assert!(applier.balances_for(user).is_empty());
    }

    #[test]
    fn hold_then_settle_writes_debit_event() {
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(10), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();

        let bal = applier.hold(user, "BTC", dec(4)).unwrap();
        assert_eq!(bal.available, dec(6));
        assert_eq!(bal.locked, dec(4));

        let bal = applier
            .settle_hold(user, "BTC", dec(4), EventKey::new("wd-1"), EventKind::Withdrawal)
            .unwrap();
        assert_eq!(bal.available, dec(6));
        assert_eq!(bal.locked, Decimal::ZERO);

        let event = applier.event(&EventKey::new("wd-1")).unwrap();
        assert_eq!(event.amount, dec(-4));
        assert!(event.is_debit());
    }

    #[test]
    fn settle_hold_is_idempotent() {
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(10), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        applier.hold(user, "BTC", dec(4)).unwrap();
        applier
            .settle_hold(user, "BTC", dec(4), EventKey::new("wd-1"), EventKind::Withdrawal)
            .unwrap();
        let bal = applier
            .settle_hold(user, "BTC", dec(4), EventKey::new("wd-1"), EventKind::Withdrawal)
            .unwrap();
        assert_eq!(bal.available, dec(6));
        assert_eq!(bal.locked, Decimal::ZERO);
    }

    #[test]
    fn hold_on_unknown_account_is_not_found() {
        let applier = EventApplier::new();
        let err = applier.hold(UserId::new(), "BTC", dec(1)).unwrap_err();
        assert!(matches!(err, SwapdeskError::BalanceNotFound { .. }));
    }

    #[test]
    fn release_hold_restores_available() {
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(10), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        applier.hold(user, "BTC", dec(4)).unwrap();
        let bal = applier.release_hold(user, "BTC", dec(4)).unwrap();
        assert_eq!(bal.available, dec(10));
        assert_eq!(bal.locked, Decimal::ZERO);
    }

    #[test]
    fn release_hold_over_locked_fails() {
        let applier = EventApplier::new();
        let user = UserId::new();
        applier
            .apply(user, "BTC", dec(10), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        applier.hold(user, "BTC", dec(4)).unwrap();
        let err = applier.release_hold(user, "BTC", dec(5)).unwrap_err();
        assert!(matches!(err, SwapdeskError::InsufficientLocked));
    }

    #[test]
    fn transfer_moves_between_users() {
        let applier = EventApplier::new();
        let alice = UserId::new();
        let bob = UserId::new();
        applier
            .apply(alice, "USDT", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();

        applier
            .transfer(
                alice,
                bob,
                "USDT",
                dec(40),
                &EventKey::new("im-1"),
                EventKind::InstantDebit,
                EventKind::InstantCredit,
            )
            .unwrap();

        assert_eq!(applier.balance(alice, "USDT").available, dec(60));
        assert_eq!(applier.balance(bob, "USDT").available, dec(40));
        // Supply conserved.
        assert_eq!(applier.total_supply("USDT"), dec(100));
    }

    #[test]
    fn transfer_replay_is_noop() {
        let applier = EventApplier::new();
        let alice = UserId::new();
        let bob = UserId::new();
        applier
            .apply(alice, "USDT", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        let key = EventKey::new("im-1");
        for _ in 0..3 {
            applier
                .transfer(
                    alice,
                    bob,
                    "USDT",
                    dec(40),
                    &key,
                    EventKind::InstantDebit,
                    EventKind::InstantCredit,
                )
                .unwrap();
        }
        assert_eq!(applier.balance(alice, "USDT").available, dec(60));
        assert_eq!(applier.balance(bob, "USDT").available, dec(40));
    }

    #[test]
    fn transfer_rejects_non_positive_amount() {
        let applier = EventApplier::new();
        let err = applier
            .transfer(
                UserId::new(),
                UserId::new(),
                "USDT",
                Decimal::ZERO,
                &EventKey::new("im-1"),
                EventKind::InstantDebit,
                EventKind::InstantCredit,
            )
            .unwrap_err();
        assert!(matches!(err, SwapdeskError::Validation { .. }));
    }

    #[test]
    fn concurrent_debits_exactly_one_wins() {
        // Scenario E: two concurrent 60-debits against available=100,
        // distinct keys -> one succeeds (available=40), one fails.
        use std::sync::Arc;

        let applier = Arc::new(EventApplier::new());
        let user = UserId::new();
        applier
            .apply(user, "X", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..2 {
            let applier = Arc::clone(&applier);
            handles.push(std::thread::spawn(move || {
                applier.apply(
                    user,
                    "X",
                    dec(-60),
                    EventKey::new(format!("wd-{i}")),
                    EventKind::Withdrawal,
                )
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one debit must win");
        assert!(results.iter().any(|r| matches!(
            r,
            Err(SwapdeskError::InsufficientBalance { .. })
        )));
        assert_eq!(applier.balance(user, "X").available, dec(40));
    }

    #[test]
    fn concurrent_same_key_applies_once() {
        use std::sync::Arc;

        let applier = Arc::new(EventApplier::new());
        let user = UserId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let applier = Arc::clone(&applier);
            handles.push(std::thread::spawn(move || {
                applier.apply(user, "BTC", dec(100), EventKey::new("dep-1"), EventKind::Deposit)
            }));
        }
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(applier.balance(user, "BTC").available, dec(100));
        assert_eq!(applier.events_for(user).len(), 1);
    }

    #[test]
    fn registered_metadata_on_first_credit() {
        let applier = EventApplier::new();
        applier.register_asset(AssetInfo::new("BTC", "Bitcoin", "https://img/btc.png"));
        let user = UserId::new();
        let bal = applier
            .apply(user, "BTC", dec(1), EventKey::new("dep-1"), EventKind::Deposit)
            .unwrap();
        assert_eq!(bal.name, "Bitcoin");
    }
}
