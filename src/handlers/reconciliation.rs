//! Reconciliation HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::reconciliation::{
    ApproveClaimRequest, CreateReconciliationRequest, DeleteReconciliationRequest, Reconciliation,
    RequestClaimRequest, ReviewReconciliationRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListReconciliationsQuery {
    pub transporter_id: Option<Uuid>,
    pub trust_account_id: Option<Uuid>,
}

/// POST /api/reconciliations - Submit a settlement document for review
pub async fn create_reconciliation(
    State(state): State<AppState>,
    Json(req): Json<CreateReconciliationRequest>,
) -> Result<(StatusCode, Json<Reconciliation>), ApiError> {
    let reconciliation = state.reconciliation_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(reconciliation)))
}

/// GET /api/reconciliations - List by transporter or trust account
pub async fn list_reconciliations(
    State(state): State<AppState>,
    Query(query): Query<ListReconciliationsQuery>,
) -> Result<Json<Vec<Reconciliation>>, ApiError> {
    let reconciliations = match (query.transporter_id, query.trust_account_id) {
        (Some(transporter_id), _) => {
            state
                .reconciliation_service
                .list_for_transporter(transporter_id)
                .await?
        }
        (None, Some(trust_account_id)) => {
            state
                .reconciliation_service
                .list_for_trust_account(trust_account_id)
                .await?
        }
        (None, None) => {
            return Err(ApiError::Validation(
                "transporter_id or trust_account_id is required".to_string(),
            ))
        }
    };
    Ok(Json(reconciliations))
}

/// GET /api/reconciliations/:id - Get a single reconciliation
pub async fn get_reconciliation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reconciliation>, ApiError> {
    let reconciliation = state
        .reconciliation_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reconciliation not found".to_string()))?;
    Ok(Json(reconciliation))
}

/// POST /api/reconciliations/:id/review - Trust account verdict
pub async fn review_reconciliation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewReconciliationRequest>,
) -> Result<Json<Reconciliation>, ApiError> {
    let reconciliation = state.reconciliation_service.review(id, req).await?;
    Ok(Json(reconciliation))
}

/// POST /api/reconciliations/:id/claim - Raise a claim on an approved document
pub async fn request_claim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RequestClaimRequest>,
) -> Result<Json<Reconciliation>, ApiError> {
    let reconciliation = state.reconciliation_service.request_claim(id, req).await?;
    Ok(Json(reconciliation))
}

/// POST /api/reconciliations/:id/approve-claim - Lender approval of a claim
pub async fn approve_claim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveClaimRequest>,
) -> Result<Json<Reconciliation>, ApiError> {
    let reconciliation = state.reconciliation_service.approve_claim(id, req).await?;
    Ok(Json(reconciliation))
}

/// GET /api/reconciliations/lender/:lender_id/pending-claims - Claims awaiting a lender
pub async fn pending_claims(
    State(state): State<AppState>,
    Path(lender_id): Path<Uuid>,
) -> Result<Json<Vec<Reconciliation>>, ApiError> {
    let claims = state
        .reconciliation_service
        .pending_claims(lender_id)
        .await?;
    Ok(Json(claims))
}

/// DELETE /api/reconciliations/:id - Withdraw an unclaimed submission
pub async fn delete_reconciliation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DeleteReconciliationRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .reconciliation_service
        .delete(id, req.transporter_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
