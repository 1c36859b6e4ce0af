//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::investment::InvestmentService;
use crate::reconciliation::ReconciliationService;
use crate::trip::TripService;
use crate::wallet::WalletService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub wallet_service: Arc<WalletService>,
    pub trip_service: Arc<TripService>,
    pub investment_service: Arc<InvestmentService>,
    pub reconciliation_service: Arc<ReconciliationService>,
    pub db_pool: PgPool,
}

impl AppState {
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            wallet_service: Arc::new(WalletService::new(db_pool.clone())),
            trip_service: Arc::new(TripService::new(db_pool.clone())),
            investment_service: Arc::new(InvestmentService::new(db_pool.clone())),
            reconciliation_service: Arc::new(ReconciliationService::new(db_pool.clone())),
            db_pool,
        }
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<TripService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.trip_service.clone()
    }
}

impl FromRef<AppState> for Arc<InvestmentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.investment_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReconciliationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reconciliation_service.clone()
    }
}
