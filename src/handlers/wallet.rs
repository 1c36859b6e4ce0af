//! Wallet HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::wallet::{AmountRequest, EntryCategory, LedgerEntry, Wallet};

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

/// Categories only the lifecycle services may write. Letting API callers
/// label a plain credit or debit with one of these would break ledger
/// replayability.
fn check_category(category: Option<EntryCategory>) -> Result<(), ApiError> {
    match category {
        Some(EntryCategory::Investment | EntryCategory::Return | EntryCategory::Escrow) => {
            Err(ApiError::Validation(
                "category is reserved for trip lifecycle entries".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

/// GET /api/wallets/:user_id - Wallet snapshot, created empty on first touch
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Wallet>, ApiError> {
    let wallet = state.wallet_service.get_wallet(user_id).await?;
    Ok(Json(wallet))
}

/// POST /api/wallets/:user_id/add-money - Credit spendable funds
pub async fn add_money(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<Wallet>, ApiError> {
    check_category(req.category)?;
    let description = req
        .description
        .unwrap_or_else(|| format!("Added {} to wallet", req.amount));
    let wallet = state
        .wallet_service
        .credit(
            user_id,
            req.amount,
            req.category.unwrap_or(EntryCategory::Payment),
            &description,
        )
        .await?;
    Ok(Json(wallet))
}

/// POST /api/wallets/:user_id/withdraw - Debit spendable funds
pub async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<Wallet>, ApiError> {
    check_category(req.category)?;
    let description = req
        .description
        .unwrap_or_else(|| format!("Withdrew {} from wallet", req.amount));
    let wallet = state
        .wallet_service
        .debit(
            user_id,
            req.amount,
            req.category.unwrap_or(EntryCategory::Withdrawal),
            &description,
        )
        .await?;
    Ok(Json(wallet))
}

/// GET /api/wallets/:user_id/transactions - Ledger history, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let entries = state.wallet_service.entries(user_id, query.limit).await?;
    Ok(Json(entries))
}
