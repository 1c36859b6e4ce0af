//! Wallet and ledger models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Wallet model, one per user, created on first touch.
///
/// `balance` is spendable, `escrowed_amount` is committed to open bids,
/// `total_invested` and `total_returns` are cumulative counters. All amounts
/// are minor currency units.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: i64,
    pub escrowed_amount: i64,
    pub total_invested: i64,
    pub total_returns: i64,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

/// Business category of a ledger entry.
///
/// `Escrow` marks moves between the spendable balance and escrow;
/// `Investment` marks conversions that leave the spendable balance untouched
/// (escrow becoming invested principal, or a write-off). Keeping the two
/// apart is what makes the log replayable: every entry's effect on the
/// spendable balance is determined by its type and category alone.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "entry_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryCategory {
    Investment,
    Return,
    Payment,
    Refund,
    Fee,
    Withdrawal,
    Escrow,
}

/// Append-only ledger entry. `balance_after` is a snapshot of the wallet's
/// spendable balance taken from the same row lock that applied the mutation,
/// never from a stale read.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_type: EntryType,
    pub amount: i64,
    pub category: EntryCategory,
    pub description: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Request body for credit/debit endpoints
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
    pub category: Option<EntryCategory>,
    pub description: Option<String>,
}

/// Recompute the spendable balance by replaying entries in chronological
/// order. Credits add, debits subtract, except `investment` debits: those
/// convert escrow into invested principal (or write it off) without touching
/// the spendable balance.
pub fn replay_balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().fold(0, |balance, entry| match entry.entry_type {
        EntryType::Credit => balance + entry.amount,
        EntryType::Debit if entry.category == EntryCategory::Investment => balance,
        EntryType::Debit => balance - entry.amount,
    })
}
