//! Trip HTTP handlers - lifecycle, bidding, allotment and settlement

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::investment::{Investment, ListInvestmentsQuery};
use crate::state::AppState;
use crate::trip::{
    Allotment, AllotTripRequest, Bid, CreateTripRequest, ListTripsQuery, PlaceBidRequest,
    PlacedBid, Settlement, SettleTripRequest, StartTransitRequest, Trip,
    UpdateTripMetadataRequest,
};

/// POST /api/trips - Create a trip open for bidding
pub async fn create_trip(
    State(state): State<AppState>,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<Trip>), ApiError> {
    let trip = state.trip_service.create_trip(req).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /api/trips - List trips with optional status/owner/lender filters
pub async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<ListTripsQuery>,
) -> Result<Json<Vec<Trip>>, ApiError> {
    let trips = state.trip_service.list_trips(query).await?;
    Ok(Json(trips))
}

/// GET /api/trips/:id - Get a single trip
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, ApiError> {
    let trip = state
        .trip_service
        .get_trip(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))?;
    Ok(Json(trip))
}

/// GET /api/trips/:id/bids - Bids on a trip, newest first
pub async fn list_bids(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, ApiError> {
    let bids = state.trip_service.bids(id).await?;
    Ok(Json(bids))
}

/// POST /api/trips/:id/bids - Place a bid, escrowing the lender's funds
pub async fn place_bid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<PlacedBid>), ApiError> {
    let placed = state.trip_service.place_bid(id, req).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// POST /api/trips/:id/allot - Accept a lender's bid and fund the trip
pub async fn allot_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AllotTripRequest>,
) -> Result<Json<Allotment>, ApiError> {
    let allotment = state.trip_service.allot_trip(id, req.lender_id).await?;
    Ok(Json(allotment))
}

/// POST /api/trips/:id/transit - Mark a funded trip as in transit
pub async fn start_transit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartTransitRequest>,
) -> Result<Json<Trip>, ApiError> {
    req.validate()?;
    let trip = state
        .trip_service
        .start_transit(id, req.transporter_id, &req.transporter_name)
        .await?;
    Ok(Json(trip))
}

/// POST /api/trips/:id/settle - Settle a funded or in-transit trip
pub async fn settle_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SettleTripRequest>,
) -> Result<Json<Settlement>, ApiError> {
    let settlement = state.trip_service.settle_trip(id, req.outcome).await?;
    Ok(Json(settlement))
}

/// POST /api/trips/:id/cancel - Cancel an unfunded trip, refunding escrows
pub async fn cancel_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, ApiError> {
    let trip = state.trip_service.cancel_trip(id).await?;
    Ok(Json(trip))
}

/// PATCH /api/trips/:id/metadata - Update non-state trip fields
pub async fn update_trip_metadata(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTripMetadataRequest>,
) -> Result<Json<Trip>, ApiError> {
    let trip = state.trip_service.update_trip_metadata(id, req).await?;
    Ok(Json(trip))
}

/// DELETE /api/trips/:id - Delete a trip nothing references yet
pub async fn delete_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.trip_service.delete_trip(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/investments - List investments with optional filters
pub async fn list_investments(
    State(state): State<AppState>,
    Query(query): Query<ListInvestmentsQuery>,
) -> Result<Json<Vec<Investment>>, ApiError> {
    let investments = state.investment_service.list_investments(query).await?;
    Ok(Json(investments))
}

/// GET /api/investments/:id - Get a single investment
pub async fn get_investment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Investment>, ApiError> {
    let investment = state
        .investment_service
        .get_investment(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Investment not found".to_string()))?;
    Ok(Json(investment))
}
