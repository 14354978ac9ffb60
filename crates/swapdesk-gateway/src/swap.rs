//! Coin swap orchestrator.
//!
//! One escrowed debit leg and one credit leg under derived keys, so a
//! retry after a partial application finishes the credit instead of
//! double-debiting. The provider quotes and executes in one call; a
//! timeout keeps the inbound leg's funds locked and surfaces as
//! `Unresolved` for operator follow-up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use swapdesk_ledger::{EventApplier, HistoryLog};
use swapdesk_types::{
    EventKey, EventKind, ProviderConfig, ProviderStatus, Result, SessionId, SwapRecord,
    SwapdeskError, UserId, WithdrawalReason,
};
use tracing::{info, warn};

use crate::clients::DynPaymentNetwork;
use crate::notify::DynNotificationSink;
use crate::session::SessionGate;

/// A verified swap submission.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub code: String,
    pub asset_in: String,
    pub amount_in: Decimal,
    pub asset_out: String,
}

/// Drives OTP-gated coin swaps through escrow and the provider.
pub struct SwapOrchestrator {
    ledger: Arc<EventApplier>,
    history: Arc<HistoryLog>,
    sessions: Arc<SessionGate>,
    network: DynPaymentNetwork,
    notifier: DynNotificationSink,
    config: ProviderConfig,
}

impl SwapOrchestrator {
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

    /// Open an OTP session for a swap.
    ///
    /// # Errors
    /// `ExternalNetwork` if the code could not be mailed.
    pub async fn begin(&self, user_id: UserId, email: impl Into<String>) -> Result<SessionId> {
        self.sessions
            .start_withdrawal(user_id, email, WithdrawalReason::Swap)
            .await
    }

    /// Execute a swap end to end.
    ///
    /// # Errors
    /// Session errors, `Validation`, `InsufficientBalance`,
    /// `ExternalNetwork` on a definitive provider failure (escrow
    /// released), or `Unresolved` on a timeout (escrow kept).
    pub async fn execute(&self, req: SwapRequest) -> Result<SwapRecord> {
        self.sessions.verify_withdrawal(
            req.session_id,
            req.user_id,
            WithdrawalReason::Swap,
            &req.code,
        )?;
        if req.amount_in <= Decimal::ZERO {
            return Err(SwapdeskError::validation("swap amount must be positive"));
        }
        if req.asset_in == req.asset_out {
            return Err(SwapdeskError::validation(
                "cannot swap an asset into itself",
            ));
        }

        self.ledger.hold(req.user_id, &req.asset_in, req.amount_in)?;
        let key = EventKey::fresh("sw");

        let call = self.network.swap(
            req.asset_in.clone(),
            req.amount_in,
            req.asset_out.clone(),
            key.clone(),
        );
        match tokio::time::timeout(self.timeout(), call).await {
            Err(_elapsed) => {
                warn!(%key, "swap timed out, keeping escrow");
                Err(SwapdeskError::Unresolved {
                    key: key.as_str().to_string(),
                })
            }
            Ok(Err(failure)) => {
                self.ledger
                    .release_hold(req.user_id, &req.asset_in, req.amount_in)?;
                Err(SwapdeskError::ExternalNetwork {
                    reason: failure.reason,
                })
            }
            Ok(Ok(receipt)) => match receipt.status {
                ProviderStatus::Completed => {
                    // Outbound leg consumes the escrow; inbound leg
                    // credits the target asset.
                    self.ledger.settle_hold(
                        req.user_id,
                        &req.asset_in,
                        req.amount_in,
                        key.leg("out"),
                        EventKind::SwapOut,
                    )?;
                    self.ledger.apply(
                        req.user_id,
                        &req.asset_out,
                        receipt.amount_out,
                        key.leg("in"),
                        EventKind::SwapIn,
                    )?;

                    let record = SwapRecord {
                        key: key.clone(),
                        user_id: req.user_id,
                        asset_in: req.asset_in.clone(),
                        amount_in: req.amount_in,
                        asset_out: req.asset_out.clone(),
                        amount_out: receipt.amount_out,
                        fee: receipt.fee,
                        status: ProviderStatus::Completed,
                        created_at: Utc::now(),
                    };
                    self.history.push_swap(record.clone());
                    info!(%key, user = %req.user_id, %record.amount_in, %record.amount_out, "swap settled");
                    self.notifier
                        .notify(
                            req.user_id,
                            "Swap completed".to_string(),
                            format!(
                                "Swapped {} {} for {} {}.",
                                record.amount_in, record.asset_in, record.amount_out,
                                record.asset_out
                            ),
                        )
                        .await;
                    Ok(record)
                }
                ProviderStatus::Failed => {
                    self.ledger
                        .release_hold(req.user_id, &req.asset_in, req.amount_in)?;
                    Err(SwapdeskError::ExternalNetwork {
                        reason: "provider rejected the swap".to_string(),
                    })
                }
                ProviderStatus::Pending => {
                    // The swap endpoint is synchronous; a pending answer
                    // is treated like a timeout.
                    warn!(%key, "swap reported pending, keeping escrow");
                    Err(SwapdeskError::Unresolved {
                        key: key.as_str().to_string(),
                    })
                }
            },
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}
