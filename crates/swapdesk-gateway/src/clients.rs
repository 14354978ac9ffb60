//! Provider network traits for external value movement.
//!
//! Trait-based abstraction over the custodial payment provider and the
//! bank rail, so the orchestrators can be driven by mocks in tests and
//! by real HTTP clients in production. Methods return boxed futures to
//! stay dyn-compatible.
//!
//! A transport-level failure ([`NetworkFailure`]) means the provider
//! never acted; a successful call that reports
//! [`ProviderStatus::Pending`] means the provider may yet act. The
//! orchestrators treat the two very differently.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use swapdesk_types::{EventKey, ProviderStatus};
use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// The provider call itself failed: the provider never received or
/// never acknowledged the request. No remote side effect occurred.
#[derive(Debug, Clone, Error)]
#[error("provider call failed: {reason}")]
pub struct NetworkFailure {
    pub reason: String,
}

impl NetworkFailure {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type NetworkResult<T> = std::result::Result<T, NetworkFailure>;

/// One inbound deposit as reported by the provider.
#[derive(Debug, Clone)]
pub struct DepositRecord {
    /// Structured reference the depositor attached: `dep:{user-uuid}`.
    pub reference_id: String,
    /// Provider-unique record id, the idempotency anchor.
    pub record_id: String,
    /// Provider's internal coin identifier.
    pub coin_id: String,
    /// Ticker symbol, used as the ledger asset.
    pub coin_symbol: String,
    pub amount: Decimal,
}

/// Provider acknowledgement of a withdrawal submission.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    pub status: ProviderStatus,
    pub provider_record_id: Option<String>,
}

/// Provider answer to a withdrawal status query.
#[derive(Debug, Clone)]
pub struct WithdrawalStatusReport {
    pub status: ProviderStatus,
    pub tx_id: Option<String>,
}

/// Provider result of a coin swap.
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    pub status: ProviderStatus,
    pub amount_out: Decimal,
    pub fee: Decimal,
}

/// Provider acknowledgement of a bank transfer.
#[derive(Debug, Clone)]
pub struct BankTransferReceipt {
    pub status: ProviderStatus,
    pub fee: Option<Decimal>,
    pub reference: Option<String>,
}

/// The custodial payment provider: deposits, crypto withdrawals, swaps.
pub trait PaymentNetwork: Send + Sync {
    /// All deposit records the provider currently reports. The poller
    /// re-reads the full list every tick; idempotency keys absorb the
    /// overlap.
    fn list_deposits(&self) -> BoxFuture<'_, NetworkResult<Vec<DepositRecord>>>;

    /// Submit a withdrawal to an external address, idempotent on `key`
    /// at the provider.
    fn withdraw(
        &self,
        asset: String,
        address: String,
        chain: String,
        amount: Decimal,
        key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<WithdrawalReceipt>>;

    /// Query the outcome of a previously submitted withdrawal.
    fn withdrawal_status(&self, key: EventKey) -> BoxFuture<'_, NetworkResult<WithdrawalStatusReport>>;

    /// Execute a coin swap at the provider's current rate.
    fn swap(
        &self,
        asset_in: String,
        amount_in: Decimal,
        asset_out: String,
        key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<SwapReceipt>>;
}

/// The fiat bank rail: recipient registration and transfers.
pub trait BankNetwork: Send + Sync {
    /// Register a payout recipient, returning the rail's recipient id.
    fn create_recipient(
        &self,
        account_number: String,
        bank_code: String,
    ) -> BoxFuture<'_, NetworkResult<String>>;

    /// Submit a transfer to a registered recipient, idempotent on `key`
    /// at the rail.
    fn transfer(
        &self,
        recipient_id: String,
        amount: Decimal,
        key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<BankTransferReceipt>>;

    /// Query the outcome of a previously submitted transfer.
    fn transfer_status(&self, key: EventKey) -> BoxFuture<'_, NetworkResult<BankTransferReceipt>>;
}

pub type DynPaymentNetwork = Arc<dyn PaymentNetwork>;
pub type DynBankNetwork = Arc<dyn BankNetwork>;

/// Mock payment provider for testing.
///
/// Records every call and returns preconfigured results.
#[derive(Default)]
pub struct MockPaymentNetwork {
    deposits: Mutex<Vec<DepositRecord>>,
    withdraw_calls: Mutex<Vec<EventKey>>,
    next_withdraw: Mutex<Option<NetworkResult<WithdrawalReceipt>>>,
    next_status: Mutex<Option<NetworkResult<WithdrawalStatusReport>>>,
    next_swap: Mutex<Option<NetworkResult<SwapReceipt>>>,
    fail_deposits: AtomicBool,
}

impl MockPaymentNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_deposit(&self, record: DepositRecord) {
        self.deposits.lock().push(record);
    }

    pub fn set_fail_deposits(&self, fail: bool) {
        self.fail_deposits.store(fail, Ordering::SeqCst);
    }

    pub fn set_next_withdraw(&self, result: NetworkResult<WithdrawalReceipt>) {
        *self.next_withdraw.lock() = Some(result);
    }

    pub fn set_next_status(&self, result: NetworkResult<WithdrawalStatusReport>) {
        *self.next_status.lock() = Some(result);
    }

    pub fn set_next_swap(&self, result: NetworkResult<SwapReceipt>) {
        *self.next_swap.lock() = Some(result);
    }

    /// Keys of all withdrawals submitted so far.
    #[must_use]
    pub fn withdraw_calls(&self) -> Vec<EventKey> {
        self.withdraw_calls.lock().clone()
    }
}

impl PaymentNetwork for MockPaymentNetwork {
    fn list_deposits(&self) -> BoxFuture<'_, NetworkResult<Vec<DepositRecord>>> {
        Box::pin(async move {
            if self.fail_deposits.load(Ordering::SeqCst) {
                return Err(NetworkFailure::new("deposit listing unavailable"));
            }
            Ok(self.deposits.lock().clone())
        })
    }

    fn withdraw(
        &self,
        _asset: String,
        _address: String,
        _chain: String,
        _amount: Decimal,
        key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<WithdrawalReceipt>> {
        Box::pin(async move {
            self.withdraw_calls.lock().push(key);
            self.next_withdraw.lock().take().unwrap_or(Ok(WithdrawalReceipt {
                status: ProviderStatus::Completed,
                provider_record_id: Some("mock-wd".to_string()),
            }))
        })
    }

    fn withdrawal_status(&self, _key: EventKey) -> BoxFuture<'_, NetworkResult<WithdrawalStatusReport>> {
        Box::pin(async move {
            self.next_status.lock().take().unwrap_or(Ok(WithdrawalStatusReport {
                status: ProviderStatus::Pending,
                tx_id: None,
            }))
        })
    }

    fn swap(
        &self,
        _asset_in: String,
        amount_in: Decimal,
        _asset_out: String,
        _key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<SwapReceipt>> {
        Box::pin(async move {
            self.next_swap.lock().take().unwrap_or(Ok(SwapReceipt {
                status: ProviderStatus::Completed,
                amount_out: amount_in,
                fee: Decimal::ZERO,
            }))
        })
    }
}

/// Mock bank rail for testing.
#[derive(Default)]
pub struct MockBankNetwork {
    recipients: Mutex<Vec<(String, String)>>,
    transfer_calls: Mutex<Vec<EventKey>>,
    next_transfer: Mutex<Option<NetworkResult<BankTransferReceipt>>>,
    next_status: Mutex<Option<NetworkResult<BankTransferReceipt>>>,
    fail_recipient: AtomicBool,
}

impl MockBankNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_recipient(&self, fail: bool) {
        self.fail_recipient.store(fail, Ordering::SeqCst);
    }

    pub fn set_next_transfer(&self, result: NetworkResult<BankTransferReceipt>) {
        *self.next_transfer.lock() = Some(result);
    }

    pub fn set_next_status(&self, result: NetworkResult<BankTransferReceipt>) {
        *self.next_status.lock() = Some(result);
    }

    #[must_use]
    pub fn transfer_calls(&self) -> Vec<EventKey> {
        self.transfer_calls.lock().clone()
    }
}

impl BankNetwork for MockBankNetwork {
    fn create_recipient(
        &self,
        account_number: String,
        bank_code: String,
    ) -> BoxFuture<'_, NetworkResult<String>> {
        Box::pin(async move {
            if self.fail_recipient.load(Ordering::SeqCst) {
                return Err(NetworkFailure::new("recipient registration unavailable"));
            }
            let id = format!("rcp-{}", self.recipients.lock().len() + 1);
            self.recipients.lock().push((account_number, bank_code));
            Ok(id)
        })
    }

    fn transfer(
        &self,
        _recipient_id: String,
        _amount: Decimal,
        key: EventKey,
    ) -> BoxFuture<'_, NetworkResult<BankTransferReceipt>> {
        Box::pin(async move {
            self.transfer_calls.lock().push(key);
            self.next_transfer.lock().take().unwrap_or(Ok(BankTransferReceipt {
                status: ProviderStatus::Completed,
                fee: Some(Decimal::TEN),
                reference: Some("mock-ref".to_string()),
            }))
        })
    }

    fn transfer_status(&self, _key: EventKey) -> BoxFuture<'_, NetworkResult<BankTransferReceipt>> {
        Box::pin(async move {
            self.next_status.lock().take().unwrap_or(Ok(BankTransferReceipt {
                status: ProviderStatus::Pending,
                fee: None,
                reference: None,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_payment_records_withdraw_calls() {
        let network = MockPaymentNetwork::new();
        let receipt = network
            .withdraw(
                "BTC".to_string(),
                "bc1q...".to_string(),
                "BTC".to_string(),
                Decimal::ONE,
                EventKey::new("wd-1"),
            )
            .await
            .unwrap();
        assert_eq!(receipt.status, ProviderStatus::Completed);
        assert_eq!(network.withdraw_calls(), vec![EventKey::new("wd-1")]);
    }

    #[tokio::test]
    async fn mock_payment_returns_configured_result() {
        let network = MockPaymentNetwork::new();
        network.set_next_withdraw(Err(NetworkFailure::new("down")));
        let err = network
            .withdraw(
                "BTC".to_string(),
                "bc1q...".to_string(),
                "BTC".to_string(),
                Decimal::ONE,
                EventKey::new("wd-1"),
            )
            .await
            .unwrap_err();
        assert!(err.reason.contains("down"));
    }

    #[tokio::test]
    async fn mock_bank_issues_recipient_ids() {
        let bank = MockBankNetwork::new();
        let a = bank
            .create_recipient("0123456789".to_string(), "058".to_string())
            .await
            .unwrap();
        let b = bank
            .create_recipient("9876543210".to_string(), "058".to_string())
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mock_deposit_listing_can_fail() {
        let network = MockPaymentNetwork::new();
        network.set_fail_deposits(true);
        assert!(network.list_deposits().await.is_err());
    }
}
