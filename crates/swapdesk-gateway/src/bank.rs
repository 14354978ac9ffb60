//! Bank transfer orchestrator.
//!
//! Same escrow discipline as the withdrawal path, against the fiat
//! rail: recipient registration happens before any ledger effect, so a
//! bad account number costs nothing; funds are escrowed only once a
//! recipient id exists.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use swapdesk_ledger::{EventApplier, HistoryLog};
use swapdesk_types::{
    BankTransferRecord, EventKey, EventKind, ProviderConfig, ProviderStatus, Result, SessionId,
    SwapdeskError, UserId, WithdrawalReason,
};
use tracing::{info, warn};

use crate::clients::DynBankNetwork;
use crate::notify::DynNotificationSink;
use crate::session::SessionGate;

/// A verified bank transfer submission.
#[derive(Debug, Clone)]
pub struct BankTransferRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub code: String,
    pub fiat_asset: String,
    pub amount: Decimal,
    pub account_number: String,
    pub bank_code: String,
}

/// Drives OTP-gated fiat payouts through escrow and the bank rail.
pub struct BankTransferOrchestrator {
    ledger: Arc<EventApplier>,
    history: Arc<HistoryLog>,
    sessions: Arc<SessionGate>,
    bank: DynBankNetwork,
    notifier: DynNotificationSink,
    config: ProviderConfig,
}

impl BankTransferOrchestrator {
    #[must_use]
    pub fn new(
        ledger: Arc<EventApplier>,
        history: Arc<HistoryLog>,
        sessions: Arc<SessionGate>,
        bank: DynBankNetwork,
        notifier: DynNotificationSink,
        config: ProviderConfig,
    ) -> Self {
        Self {
            ledger,
            history,
            sessions,
            bank,
            notifier,
            config,
        }
    }

    /// Open an OTP session for a bank transfer.
    ///
    /// # Errors
    /// `ExternalNetwork` if the code could not be mailed.
    pub async fn begin(&self, user_id: UserId, email: impl Into<String>) -> Result<SessionId> {
        self.sessions
            .start_withdrawal(user_id, email, WithdrawalReason::BankTransfer)
            .await
    }

    /// Execute a bank transfer end to end.
    ///
    /// # Errors
    /// Session errors, `Validation`, `InsufficientBalance`,
    /// `ExternalNetwork` on a definitive failure (escrow released, or
    /// never taken if recipient registration failed), or `Unresolved`
    /// when the rail's outcome is unknown (escrow kept).
    pub async fn execute(&self, req: BankTransferRequest) -> Result<BankTransferRecord> {
        self.sessions.verify_withdrawal(
            req.session_id,
            req.user_id,
            WithdrawalReason::BankTransfer,
            &req.code,
        )?;
        if req.amount <= Decimal::ZERO {
            return Err(SwapdeskError::validation("transfer amount must be positive"));
        }

        // Register the recipient before touching the ledger.
        let recipient_call = self.bank.create_recipient(req.account_number, req.bank_code);
        let recipient_id = match tokio::time::timeout(self.timeout(), recipient_call).await {
            Err(_elapsed) => {
                return Err(SwapdeskError::ExternalNetwork {
                    reason: "recipient registration timed out".to_string(),
                });
            }
            Ok(Err(failure)) => {
                return Err(SwapdeskError::ExternalNetwork {
                    reason: failure.reason,
                });
            }
            Ok(Ok(id)) => id,
        };

        self.ledger.hold(req.user_id, &req.fiat_asset, req.amount)?;
        let key = EventKey::fresh("bt");
        self.history.push_bank_transfer(BankTransferRecord {
            key: key.clone(),
            user_id: req.user_id,
            fiat_asset: req.fiat_asset.clone(),
            amount: req.amount,
            recipient_id: recipient_id.clone(),
            fee: None,
            reference: None,
            status: ProviderStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        });

        let call = self.bank.transfer(recipient_id, req.amount, key.clone());
        match tokio::time::timeout(self.timeout(), call).await {
            Err(_elapsed) => {
                warn!(%key, "bank transfer timed out, keeping escrow");
                Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                })
            }
            Ok(Err(failure)) => {
                self.ledger
                    .release_hold(req.user_id, &req.fiat_asset, req.amount)?;
                self.history
                    .resolve_bank_transfer(&key, ProviderStatus::Failed);
                Err(SwapdeskError::ExternalNetwork {
                    reason: failure.reason,
                })
            }
            Ok(Ok(receipt)) => match receipt.status {
                ProviderStatus::Completed => {
                    self.settle(req.user_id, &req.fiat_asset, req.amount, &key)
                        .await?;
                    self.stamp(&key, receipt.fee, receipt.reference)
                }
                ProviderStatus::Failed => {
                    self.ledger
                        .release_hold(req.user_id, &req.fiat_asset, req.amount)?;
                    self.history
                        .resolve_bank_transfer(&key, ProviderStatus::Failed);
                    Err(SwapdeskError::ExternalNetwork {
                        reason: "bank rejected the transfer".to_string(),
                    })
                }
                ProviderStatus::Pending => {
                    info!(%key, "bank transfer pending at rail, keeping escrow");
                    if let Err(err) = self.stamp(&key, receipt.fee, receipt.reference) {
                        warn!(%key, %err, "pending transfer record could not be stamped");
                    }
                    Err(SwapdeskError::Unresolved {
                        key: key.as_str().to_string(),
                    })
                }
            },
        }
    }

    /// Query the rail for an unresolved transfer and settle or release.
    /// Safe to call repeatedly.
    ///
    /// # Errors
    /// `Validation` for an unknown key, `Unresolved` while the rail
    /// still reports pending or cannot be reached.
    pub async fn resolve(&self, key: &EventKey) -> Result<BankTransferRecord> {
        let record = self
            .history
            .bank_transfer(key)
            .ok_or_else(|| SwapdeskError::validation(format!("unknown bank transfer key {key}")))?;
        if record.status.is_final() {
            return Ok(record);
        }

        let call = self.bank.transfer_status(key.clone());
        let receipt = match tokio::time::timeout(self.timeout(), call).await {
            Err(_) | Ok(Err(_)) => {
                return Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                });
            }
            Ok(Ok(receipt)) => receipt,
        };

        match receipt.status {
            ProviderStatus::Completed => {
                self.settle(record.user_id, &record.fiat_asset, record.amount, key)
                    .await?;
                self.stamp(key, receipt.fee, receipt.reference)
            }
            ProviderStatus::Failed => {
                self.ledger
                    .release_hold(record.user_id, &record.fiat_asset, record.amount)?;
                self.history
                    .resolve_bank_transfer(key, ProviderStatus::Failed);
                info!(%key, "bank transfer failed at rail, escrow released");
                self.history
                    .bank_transfer(key)
                    .ok_or_else(|| SwapdeskError::Internal("bank transfer record lost".into()))
            }
            ProviderStatus::Pending => Err(SwapdeskError::Unresolved {
                key: key.as_str().to_string(),
            }),
        }
    }

    async fn settle(
        &self,
        user_id: UserId,
        fiat_asset: &str,
        amount: Decimal,
        key: &EventKey,
    ) -> Result<()> {
        self.ledger.settle_hold(
            user_id,
            fiat_asset,
            amount,
            key.clone(),
            EventKind::BankTransfer,
        )?;
        self.history
            .resolve_bank_transfer(key, ProviderStatus::Completed);
        info!(%key, user = %user_id, %amount, fiat_asset, "bank transfer settled");
        self.notifier
            .notify(
                user_id,
                "Bank transfer completed".to_string(),
                format!("Your transfer of {amount} {fiat_asset} has been sent."),
            )
            .await;
        Ok(())
    }

    /// Write the rail's fee and reference onto the record.
    fn stamp(
        &self,
        key: &EventKey,
        fee: Option<Decimal>,
        reference: Option<String>,
    ) -> Result<BankTransferRecord> {
        let mut record = self
            .history
            .bank_transfer(key)
            .ok_or_else(|| SwapdeskError::Internal("bank transfer record lost".into()))?;
        if fee.is_some() {
            record.fee = fee;
        }
        if reference.is_some() {
            record.reference = reference;
        }
        self.history.push_bank_transfer(record.clone());
        Ok(record)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}
