//! # swapdesk-market
//!
//! The P2P marketplace: merchant advertisements plus the two trade
//! paths that execute against them.
//!
//! - [`OrderEngine`] runs the escrowed flow: the seller's asset is held
//!   at order creation and only settles or releases at a terminal
//!   status.
//! - [`InstantMatchEngine`] runs the synchronous flow: no standing
//!   escrow, balances move when the seller releases.
//!
//! The two engines share the [`AdvertisementBook`] and the ledger but
//! are otherwise independent state machines.

pub mod ads;
pub mod engine;
pub mod instant;

pub use ads::{AdvertisementBook, NewAdvertisement};
pub use engine::OrderEngine;
pub use instant::InstantMatchEngine;
