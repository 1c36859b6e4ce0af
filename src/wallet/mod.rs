//! Wallet domain module
//!
//! Ledger primitives and the append-only entry log.

mod model;
mod service;

pub use model::*;
pub use service::WalletService;
