//! Deposit reconciliation poller.
//!
//! Periodically re-reads the provider's full deposit list and credits
//! anything new. Correctness leans entirely on the ledger's idempotency
//! keys (`dep-{record_id}`): the poller itself keeps no cursor and no
//! state, so a crash, a restart, or overlapping ticks cannot double
//! credit. Malformed records are logged and skipped, never fatal for
//! the tick.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use swapdesk_ledger::EventApplier;
use swapdesk_types::{EventKey, EventKind, PollerConfig, Result, SwapdeskError, UserId, constants};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{DepositRecord, DynPaymentNetwork};

/// What one reconciliation tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// New deposits credited this tick.
    pub applied: usize,
    /// Records whose key had already been applied.
    pub duplicates: usize,
    /// Malformed or uncreditable records.
    pub skipped: usize,
}

/// Polls the provider's deposit list into the ledger.
pub struct ReconciliationPoller {
    ledger: Arc<EventApplier>,
    network: DynPaymentNetwork,
    config: PollerConfig,
}

impl ReconciliationPoller {
    #[must_use]
    pub fn new(ledger: Arc<EventApplier>, network: DynPaymentNetwork, config: PollerConfig) -> Self {
        Self {
            ledger,
            network,
            config,
        }
    }

    /// One full-rescan pass over the provider's deposit list.
    ///
    /// # Errors
    /// `ExternalNetwork` if the list itself could not be fetched.
    /// Per-record problems are counted as skipped, not errors.
    pub async fn tick(&self) -> Result<ReconcileReport> {
        let deposits = self
            .network
            .list_deposits()
            .await
            .map_err(|err| SwapdeskError::ExternalNetwork { reason: err.reason })?;

        let mut report = ReconcileReport::default();
        for record in deposits {
            self.credit(&record, &mut report);
        }
        info!(
            applied = report.applied,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "reconciliation tick"
        );
        Ok(report)
    }

    /// Run ticks forever at the configured interval. Errors are logged
    /// and the loop continues; the next tick re-reads everything anyway.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                warn!(%err, "reconciliation tick failed");
            }
        }
    }

    fn credit(&self, record: &DepositRecord, report: &mut ReconcileReport) {
        let Some(user_id) = parse_reference(&record.reference_id) else {
            warn!(reference = %record.reference_id, "deposit with unparseable reference skipped");
            report.skipped += 1;
            return;
        };
        if record.amount <= Decimal::ZERO {
            warn!(record = %record.record_id, "deposit with non-positive amount skipped");
            report.skipped += 1;
            return;
        }

        let key = EventKey::new(format!("dep-{}", record.record_id));
        if self.ledger.has_event(&key) {
            report.duplicates += 1;
            return;
        }
        match self.ledger.apply(
            user_id,
            &record.coin_symbol,
            record.amount,
            key,
            EventKind::Deposit,
        ) {
            Ok(_) => report.applied += 1,
            Err(err) => {
                warn!(record = %record.record_id, %err, "deposit credit failed, skipped");
                report.skipped += 1;
            }
        }
    }
}

/// Parse a structured deposit reference `dep:{user-uuid}`.
fn parse_reference(reference: &str) -> Option<UserId> {
    let raw = reference.strip_prefix(constants::DEPOSIT_REFERENCE_PREFIX)?;
    Uuid::from_str(raw).ok().map(UserId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockPaymentNetwork;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn deposit(user: UserId, record_id: &str, amount: Decimal) -> DepositRecord {
        DepositRecord {
            reference_id: format!("{}{}", constants::DEPOSIT_REFERENCE_PREFIX, user.0),
            record_id: record_id.to_string(),
            coin_id: "coin-usdt".to_string(),
            coin_symbol: "USDT".to_string(),
            amount,
        }
    }

    fn setup() -> (ReconciliationPoller, Arc<EventApplier>, Arc<MockPaymentNetwork>) {
        let ledger = Arc::new(EventApplier::new());
        let network = Arc::new(MockPaymentNetwork::new());
        let poller = ReconciliationPoller::new(
            Arc::clone(&ledger),
            Arc::clone(&network) as DynPaymentNetwork,
            PollerConfig::default(),
        );
        (poller, ledger, network)
    }

    #[test]
    fn reference_parsing() {
        let user = UserId::new();
        let parsed = parse_reference(&format!("dep:{}", user.0)).unwrap();
        assert_eq!(parsed, user);

        assert!(parse_reference("dep:not-a-uuid").is_none());
        assert!(parse_reference("wd:0192f3a0-0000-7000-8000-000000000000").is_none());
        assert!(parse_reference("").is_none());
    }

    #[tokio::test]
    async fn tick_credits_new_deposits() {
        let (poller, ledger, network) = setup();
        let user = UserId::new();
        network.push_deposit(deposit(user, "rec-1", dec(250)));

        let report = poller.tick().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(ledger.balance(user, "USDT").available, dec(250));
    }

    #[tokio::test]
    async fn full_rescan_absorbs_already_seen_records() {
        // Scenario A at the poller level: the same provider record shows
        // up on every tick and credits exactly once.
        let (poller, ledger, network) = setup();
        let user = UserId::new();
        network.push_deposit(deposit(user, "rec-1", dec(250)));

        poller.tick().await.unwrap();
        let report = poller.tick().await.unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(ledger.balance(user, "USDT").available, dec(250));
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let (poller, ledger, network) = setup();
        let user = UserId::new();
        network.push_deposit(DepositRecord {
            reference_id: "free text the depositor typed".to_string(),
            record_id: "rec-bad".to_string(),
            coin_id: "coin-usdt".to_string(),
            coin_symbol: "USDT".to_string(),
            amount: dec(10),
        });
        network.push_deposit(deposit(user, "rec-neg", dec(-5)));
        network.push_deposit(deposit(user, "rec-ok", dec(100)));

        let report = poller.tick().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(ledger.balance(user, "USDT").available, dec(100));
    }

    #[tokio::test]
    async fn listing_failure_is_an_error_not_a_crash() {
        let (poller, _ledger, network) = setup();
        network.set_fail_deposits(true);
        let err = poller.tick().await.unwrap_err();
        assert!(matches!(err, SwapdeskError::ExternalNetwork { .. }));

        // Next tick works again.
        network.set_fail_deposits(false);
        assert!(poller.tick().await.is_ok());
    }

    #[tokio::test]
    async fn distinct_records_same_user_both_credit() {
        let (poller, ledger, network) = setup();
        let user = UserId::new();
        network.push_deposit(deposit(user, "rec-1", dec(100)));
        network.push_deposit(deposit(user, "rec-2", dec(100)));

        let report = poller.tick().await.unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(ledger.balance(user, "USDT").available, dec(200));
    }
}
