//! # swapdesk-gateway
//!
//! Everything that touches the outside world: OTP sessions, the
//! provider/bank network seams, the orchestrators that sequence
//! escrow around external calls, and the deposit reconciliation
//! poller.
//!
//! The invariant this crate defends: an external call with an unknown
//! outcome never releases escrow. Funds stay locked until a status
//! query gives a definitive answer.

pub mod bank;
pub mod clients;
pub mod notify;
pub mod reconcile;
pub mod session;
pub mod swap;
pub mod withdraw;

pub use bank::{BankTransferOrchestrator, BankTransferRequest};
pub use clients::{
    BankNetwork, BoxFuture, DepositRecord, DynBankNetwork, DynPaymentNetwork, NetworkFailure,
    NetworkResult, PaymentNetwork,
};
pub use notify::{DynMailSink, DynNotificationSink, LogNotifier, MailSink, NotificationSink};
pub use reconcile::{ReconcileReport, ReconciliationPoller};
pub use session::{LoginOutcome, SessionGate};
pub use swap::{SwapOrchestrator, SwapRequest};
pub use withdraw::{WithdrawalOrchestrator, WithdrawalRequest};
