//! Provider-record history log.
//!
//! Holds the provider-specific audit records written by the withdrawal,
//! bank-transfer, and swap orchestrators, keyed by idempotency key so an
//! unresolved operation can be found and settled later. Records update
//! their provider status, but their amounts never change; the ledger
//! effect lives in `LedgerEvent`s, not here.

use chrono::Utc;
use dashmap::DashMap;
use swapdesk_types::{
    BankTransferRecord, EventKey, ProviderStatus, SwapRecord, UserId, WithdrawalRecord,
};

/// Append-only audit log of provider operations.
pub struct HistoryLog {
    withdrawals: DashMap<EventKey, WithdrawalRecord>,
    bank_transfers: DashMap<EventKey, BankTransferRecord>,
    swaps: DashMap<EventKey, SwapRecord>,
}

impl HistoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            withdrawals: DashMap::new(),
            bank_transfers: DashMap::new(),
            swaps: DashMap::new(),
        }
    }

    pub fn push_withdrawal(&self, record: WithdrawalRecord) {
        self.withdrawals.insert(record.key.clone(), record);
    }

    pub fn push_bank_transfer(&self, record: BankTransferRecord) {
        self.bank_transfers.insert(record.key.clone(), record);
    }

    pub fn push_swap(&self, record: SwapRecord) {
        self.swaps.insert(record.key.clone(), record);
    }

    /// Update a withdrawal's provider status once resolution is known.
    pub fn resolve_withdrawal(&self, key: &EventKey, status: ProviderStatus, tx_id: Option<String>) {
        if let Some(mut record) = self.withdrawals.get_mut(key) {
            record.status = status;
            record.resolved_at = Some(Utc::now());
            if tx_id.is_some() {
                record.tx_id = tx_id;
            }
        }
    }

    /// Update a bank transfer's provider status once resolution is known.
    pub fn resolve_bank_transfer(&self, key: &EventKey, status: ProviderStatus) {
        if let Some(mut record) = self.bank_transfers.get_mut(key) {
            record.status = status;
            record.resolved_at = Some(Utc::now());
        }
    }

    #[must_use]
    pub fn withdrawal(&self, key: &EventKey) -> Option<WithdrawalRecord> {
        self.withdrawals.get(key).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn bank_transfer(&self, key: &EventKey) -> Option<BankTransferRecord> {
        self.bank_transfers.get(key).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn swap(&self, key: &EventKey) -> Option<SwapRecord> {
        self.swaps.get(key).map(|entry| entry.clone())
    }

    /// A user's withdrawal records, oldest first.
    #[must_use]
    pub fn withdrawals_for(&self, user_id: UserId) -> Vec<WithdrawalRecord> {
        let mut out: Vec<WithdrawalRecord> = self
            .withdrawals
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|record| record.created_at);
        out
    }

    /// A user's bank-transfer records, oldest first.
    #[must_use]
    pub fn bank_transfers_for(&self, user_id: UserId) -> Vec<BankTransferRecord> {
        let mut out: Vec<BankTransferRecord> = self
            .bank_transfers
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|record| record.created_at);
        out
    }

    /// A user's swap records, oldest first.
    #[must_use]
    pub fn swaps_for(&self, user_id: UserId) -> Vec<SwapRecord> {
        let mut out: Vec<SwapRecord> = self
            .swaps
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by_key(|record| record.created_at);
        out
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn sample_withdrawal(user: UserId, key: &str) -> WithdrawalRecord {
        WithdrawalRecord {
            key: EventKey::new(key),
            user_id: user,
            asset: "BTC".to_string(),
            amount: Decimal::ONE,
            address: "bc1q...".to_string(),
            chain: "BTC".to_string(),
            provider_record_id: None,
            tx_id: None,
            status: ProviderStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn push_and_lookup() {
        let log = HistoryLog::new();
        let user = UserId::new();
        log.push_withdrawal(sample_withdrawal(user, "wd-1"));
        assert!(log.withdrawal(&EventKey::new("wd-1")).is_some());
        assert!(log.withdrawal(&EventKey::new("wd-2")).is_none());
    }

    #[test]
    fn resolve_updates_status_and_txid() {
        let log = HistoryLog::new();
        let user = UserId::new();
        log.push_withdrawal(sample_withdrawal(user, "wd-1"));
        log.resolve_withdrawal(
            &EventKey::new("wd-1"),
            ProviderStatus::Completed,
            Some("0xabc".to_string()),
        );
        let record = log.withdrawal(&EventKey::new("wd-1")).unwrap();
        assert_eq!(record.status, ProviderStatus::Completed);
        assert_eq!(record.tx_id.as_deref(), Some("0xabc"));
        assert!(record.resolved_at.is_some());
    }

    #[test]
    fn per_user_listing_ordered() {
        let log = HistoryLog::new();
        let user = UserId::new();
        log.push_withdrawal(sample_withdrawal(user, "wd-1"));
        log.push_withdrawal(sample_withdrawal(user, "wd-2"));
        log.push_withdrawal(sample_withdrawal(UserId::new(), "wd-3"));

        let records = log.withdrawals_for(user);
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at <= records[1].created_at);
    }
}
