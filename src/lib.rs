//! Trip financing backend library
//!
//! Core modules for the freight financing marketplace: wallet ledger,
//! trip lifecycle, investments and settlement reconciliation.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod investment;
pub mod middleware;
pub mod reconciliation;
pub mod routes;
pub mod state;
pub mod trip;
pub mod wallet;
