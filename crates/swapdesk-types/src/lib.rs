//! # swapdesk-types
//!
//! Shared types, errors, and configuration for the **swapdesk**
//! peer-to-peer trading core.
//!
//! This crate is the leaf dependency of the workspace; every other
//! crate depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`AdvertisementId`], [`OrderId`], [`TradeId`], [`SessionId`], [`EventKey`]
//! - **Balance model**: [`Balance`], [`AssetInfo`], [`Asset`], [`AccountKey`]
//! - **Ledger events**: [`LedgerEvent`], [`EventKind`]
//! - **Market model**: [`Advertisement`], [`AdSide`], [`Order`], [`OrderStatus`], [`ChatMessage`], [`InstantTrade`], [`InstantStatus`]
//! - **Sessions**: [`Session`], [`SessionKind`], [`WithdrawalReason`]
//! - **Provider history**: [`WithdrawalRecord`], [`BankTransferRecord`], [`SwapRecord`], [`ProviderStatus`]
//! - **Configuration**: [`SessionConfig`], [`PollerConfig`], [`ProviderConfig`]
//! - **Errors**: [`SwapdeskError`] with `SD_ERR_` prefix codes

pub mod advertisement;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod history;
pub mod ids;
pub mod instant;
pub mod order;
pub mod session;

// Re-export all primary types at crate root for ergonomic imports:
//   use swapdesk_types::{Balance, Order, Session, SwapdeskError, ...};

pub use advertisement::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use history::*;
pub use ids::*;
pub use instant::*;
pub use order::*;
pub use session::*;

// Constants are accessed via `swapdesk_types::constants::FOO`
// (not re-exported to avoid name collisions).
