//! Route definitions for the financing API

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn trip_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trips", post(create_trip).get(list_trips))
        .route("/api/trips/:id", get(get_trip).delete(delete_trip))
        .route("/api/trips/:id/bids", get(list_bids).post(place_bid))
        .route("/api/trips/:id/allot", post(allot_trip))
        .route("/api/trips/:id/transit", post(start_transit))
        .route("/api/trips/:id/settle", post(settle_trip))
        .route("/api/trips/:id/cancel", post(cancel_trip))
        .route("/api/trips/:id/metadata", patch(update_trip_metadata))
        .route("/api/investments", get(list_investments))
        .route("/api/investments/:id", get(get_investment))
}

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wallets/:user_id", get(get_wallet))
        .route("/api/wallets/:user_id/add-money", post(add_money))
        .route("/api/wallets/:user_id/withdraw", post(withdraw))
        .route("/api/wallets/:user_id/transactions", get(list_transactions))
}

pub fn reconciliation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reconciliations",
            post(create_reconciliation).get(list_reconciliations),
        )
        .route(
            "/api/reconciliations/:id",
            get(get_reconciliation).delete(delete_reconciliation),
        )
        .route("/api/reconciliations/:id/review", post(review_reconciliation))
        .route("/api/reconciliations/:id/claim", post(request_claim))
        .route(
            "/api/reconciliations/:id/approve-claim",
            post(approve_claim),
        )
        .route(
            "/api/reconciliations/lender/:lender_id/pending-claims",
            get(pending_claims),
        )
}
