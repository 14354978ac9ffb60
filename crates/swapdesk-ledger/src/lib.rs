//! # swapdesk-ledger
//!
//! The balance ledger: per-(user, asset) accounts with available/locked
//! amounts, mutated exclusively through the idempotent [`EventApplier`].
//!
//! Guarantees:
//! - exactly-once application per idempotency key (replays are silent
//!   successes, never double-mutations);
//! - `available >= 0` and `locked >= 0` after every operation; a
//!   violating mutation is rejected with nothing written;
//! - read-modify-write atomicity per account: same-account operations
//!   serialize on the account's own lock, different accounts run in
//!   parallel.
//!
//! [`HistoryLog`] keeps the provider-specific audit records written by
//! the orchestrators, separate from the ledger's own event log.

pub mod accounts;
pub mod applier;
pub mod history;

pub use accounts::AccountBook;
pub use applier::EventApplier;
pub use history::HistoryLog;
