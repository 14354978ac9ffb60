//! Crypto withdrawal orchestrator.
//!
//! Sequencing is the whole point of this module: verify the OTP
//! session, escrow the funds, submit to the provider under a timeout,
//! and only settle the escrow once the provider confirms. An unknown
//! outcome (timeout, or a `Pending` receipt) keeps the funds locked and
//! surfaces as [`SwapdeskError::Unresolved`] so the caller polls
//! [`WithdrawalOrchestrator::resolve`] instead of retrying blind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use swapdesk_ledger::{EventApplier, HistoryLog};
use swapdesk_types::{
    EventKey, EventKind, ProviderConfig, ProviderStatus, Result, SessionId, SwapdeskError, UserId,
    WithdrawalReason, WithdrawalRecord,
};
use tracing::{info, warn};

use crate::clients::DynPaymentNetwork;
use crate::notify::DynNotificationSink;
use crate::session::SessionGate;

/// A verified withdrawal submission.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub code: String,
    pub asset: String,
    pub address: String,
    pub chain: String,
    pub amount: Decimal,
}

/// Drives OTP-gated withdrawals through escrow and the provider.
pub struct WithdrawalOrchestrator {
    ledger: Arc<EventApplier>,
    history: Arc<HistoryLog>,
    sessions: Arc<SessionGate>,
    network: DynPaymentNetwork,
    notifier: DynNotificationSink,
    config: ProviderConfig,
}

impl WithdrawalOrchestrator {
    #[must_use]
    pub fn new(
        ledger: Arc<EventApplier>,
        history: Arc<HistoryLog>,
        sessions: Arc<SessionGate>,
        network: DynPaymentNetwork,
        notifier: DynNotificationSink,
        config: ProviderConfig,
    ) -> Self {
        Self {
            ledger,
            history,
            sessions,
            network,
            notifier,
            config,
        }
    }

    /// Open an OTP session for a crypto withdrawal.
    ///
    /// # Errors
    /// `ExternalNetwork` if the code could not be mailed.
    pub async fn begin(&self, user_id: UserId, email: impl Into<String>) -> Result<SessionId> {
        self.sessions
            .start_withdrawal(user_id, email, WithdrawalReason::CryptoWithdrawal)
            .await
    }

    /// Execute a withdrawal end to end.
    ///
    /// Balance is re-validated at escrow time, not at session time: the
    /// OTP round trip is long enough for other operations to have moved
    /// funds.
    ///
    /// # Errors
    /// Session errors, `Validation` for a non-positive amount,
    /// `InsufficientBalance`, `ExternalNetwork` on a definitive provider
    /// failure (escrow released), or `Unresolved` when the outcome is
    /// unknown (escrow kept, poll [`Self::resolve`]).
    pub async fn execute(&self, req: WithdrawalRequest) -> Result<WithdrawalRecord> {
        self.sessions.verify_withdrawal(
            req.session_id,
            req.user_id,
            WithdrawalReason::CryptoWithdrawal,
            &req.code,
        )?;
        if req.amount <= Decimal::ZERO {
            return Err(SwapdeskError::validation(
                "withdrawal amount must be positive",
            ));
        }

        self.ledger.hold(req.user_id, &req.asset, req.amount)?;
        let key = EventKey::fresh("wd");
        self.history.push_withdrawal(WithdrawalRecord {
            key: key.clone(),
            user_id: req.user_id,
            asset: req.asset.clone(),
            amount: req.amount,
            address: req.address.clone(),
            chain: req.chain.clone(),
            provider_record_id: None,
            tx_id: None,
            status: ProviderStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        });

        let call = self.network.withdraw(
            req.asset.clone(),
            req.address,
            req.chain,
            req.amount,
            key.clone(),
        );
        let outcome = tokio::time::timeout(self.timeout(), call).await;

        match outcome {
            Err(_elapsed) => {
                // Outcome unknown: the provider may have accepted the
                // request. Funds stay locked until resolution.
                warn!(%key, "withdrawal submission timed out, keeping escrow");
                Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                })
            }
            Ok(Err(failure)) => {
                // Transport failure: the provider never acted.
                self.ledger.release_hold(req.user_id, &req.asset, req.amount)?;
                self.history
                    .resolve_withdrawal(&key, ProviderStatus::Failed, None);
                Err(SwapdeskError::ExternalNetwork {
                    reason: failure.reason,
                })
            }
            Ok(Ok(receipt)) => match receipt.status {
                ProviderStatus::Completed => {
                    self.settle(req.user_id, &req.asset, req.amount, &key, None)
                        .await?;
                    if let Some(mut record) = self.history.withdrawal(&key) {
                        record.provider_record_id = receipt.provider_record_id;
                        self.history.push_withdrawal(record);
                    }
                    self.history
                        .withdrawal(&key)
                        .ok_or_else(|| SwapdeskError::Internal("withdrawal record lost".into()))
                }
                ProviderStatus::Failed => {
                    self.ledger.release_hold(req.user_id, &req.asset, req.amount)?;
                    self.history
                        .resolve_withdrawal(&key, ProviderStatus::Failed, None);
                    Err(SwapdeskError::ExternalNetwork {
                        reason: "provider rejected the withdrawal".to_string(),
                    })
                }
                ProviderStatus::Pending => {
                    info!(%key, "withdrawal pending at provider, keeping escrow");
                    if let Some(mut record) = self.history.withdrawal(&key) {
                        record.provider_record_id = receipt.provider_record_id;
                        self.history.push_withdrawal(record);
                    }
                    Err(SwapdeskError::Unresolved {
                        key: key.as_str().to_string(),
                    })
                }
            },
        }
    }

    /// Query the provider for an unresolved withdrawal and settle or
    /// release accordingly. Safe to call repeatedly; an already-final
    /// record is returned as-is.
    ///
    /// # Errors
    /// `Validation` for an unknown key, `Unresolved` while the provider
    /// still reports pending or cannot be reached.
    pub async fn resolve(&self, key: &EventKey) -> Result<WithdrawalRecord> {
        let record = self
            .history
            .withdrawal(key)
            .ok_or_else(|| SwapdeskError::validation(format!("unknown withdrawal key {key}")))?;
        if record.status.is_final() {
            return Ok(record);
        }

        let call = self.network.withdrawal_status(key.clone());
        let report = match tokio::time::timeout(self.timeout(), call).await {
            Err(_elapsed) => {
                return Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                });
            }
            Ok(Err(_failure)) => {
                return Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                });
            }
            Ok(Ok(report)) => report,
        };

        match report.status {
            ProviderStatus::Completed => {
                self.settle(record.user_id, &record.asset, record.amount, key, report.tx_id)
                    .await?;
                self.history
                    .withdrawal(key)
                    .ok_or_else(|| SwapdeskError::Internal("withdrawal record lost".into()))
            }
            ProviderStatus::Failed => {
                self.ledger
                    .release_hold(record.user_id, &record.asset, record.amount)?;
                self.history
                    .resolve_withdrawal(key, ProviderStatus::Failed, None);
                info!(%key, "withdrawal failed at provider, escrow released");
                self.history
                    .withdrawal(key)
                    .ok_or_else(|| SwapdeskError::Internal("withdrawal record lost".into()))
            }
            ProviderStatus::Pending => Err(SwapdeskError::Unresolved {
                key: key.as_str().to_string(),
            }),
        }
    }

    async fn settle(
        &self,
        user_id: UserId,
        asset: &str,
        amount: Decimal,
        key: &EventKey,
        tx_id: Option<String>,
    ) -> Result<()> {
        self.ledger
            .settle_hold(user_id, asset, amount, key.clone(), EventKind::Withdrawal)?;
        self.history
            .resolve_withdrawal(key, ProviderStatus::Completed, tx_id);
        info!(%key, user = %user_id, %amount, asset, "withdrawal settled");
        self.notifier
            .notify(
                user_id,
                "Withdrawal completed".to_string(),
                format!("Your withdrawal of {amount} {asset} has been sent."),
            )
            .await;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}
