//! Trip models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::investment::Investment;
use crate::wallet::Wallet;

/// Fixed platform markup applied to the annualized bid rate. The spread
/// between the shipper-facing rate and the lender's bid rate is the
/// platform's margin.
pub const RATE_MARKUP: f64 = 1.2;

/// Derive the shipper-facing interest rate from a lender's bid.
///
/// The bid's period rate is annualized over `maturity_days`, marked up, and
/// converted back to a period rate. Computed at full precision from the
/// original bid figures; rounding is a display concern.
pub fn shipper_rate(bid_rate: f64, maturity_days: i32) -> f64 {
    let yearly = bid_rate * 365.0 / maturity_days as f64;
    let adjusted = yearly * RATE_MARKUP;
    adjusted * maturity_days as f64 / 365.0
}

/// Trip status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,   // Created, open for bids
    Escrowed,  // At least one bid with escrowed funds
    Funded,    // Allotted to a lender, funds disbursed
    InTransit, // Transporter accepted and started the trip
    Completed, // Settled (repaid or defaulted)
    Cancelled, // Withdrawn before funding
}

impl TripStatus {
    /// Whether the trip can still move to another state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

/// Risk classification of a trip
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "risk_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Trip model
///
/// Invariant: `lender_id` is set exactly when status is funded, in_transit or
/// completed; `interest_rate` is the shipper-facing rate set at allotment.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Trip {
    pub id: Uuid,
    pub load_owner_id: Uuid,
    pub load_owner_name: String,
    pub client_company: Option<String>,
    pub transporter_id: Option<Uuid>,
    pub transporter_name: Option<String>,
    pub origin: String,
    pub destination: String,
    pub distance: f64,
    pub weight: f64,
    pub load_type: String,
    pub amount: i64,
    pub interest_rate: Option<f64>,
    pub maturity_days: i32,
    pub risk_level: RiskLevel,
    pub insurance_status: bool,
    pub status: TripStatus,
    pub lender_id: Option<Uuid>,
    pub lender_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Bid model; immutable once created and consumed by allotment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Bid {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub lender_id: Uuid,
    pub lender_name: String,
    pub amount: i64,
    pub interest_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a trip
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTripRequest {
    pub load_owner_id: Uuid,
    #[validate(length(min = 1, message = "load owner name is required"))]
    pub load_owner_name: String,
    pub client_company: Option<String>,
    #[validate(length(min = 1, message = "origin is required"))]
    pub origin: String,
    #[validate(length(min = 1, message = "destination is required"))]
    pub destination: String,
    #[validate(range(min = 0.1, message = "distance must be positive"))]
    pub distance: f64,
    #[validate(range(min = 0.1, message = "weight must be positive"))]
    pub weight: f64,
    #[validate(length(min = 1, message = "load type is required"))]
    pub load_type: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    pub maturity_days: Option<i32>,
    pub risk_level: Option<RiskLevel>,
    pub insurance_status: Option<bool>,
}

/// Request DTO for placing a bid
#[derive(Debug, Deserialize, Validate)]
pub struct PlaceBidRequest {
    pub lender_id: Uuid,
    #[validate(length(min = 1, message = "lender name is required"))]
    pub lender_name: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(range(min = 0.0001, message = "interest rate must be positive"))]
    pub interest_rate: f64,
}

/// Request DTO for accepting a bid
#[derive(Debug, Deserialize)]
pub struct AllotTripRequest {
    pub lender_id: Uuid,
}

/// Request DTO for the funded -> in_transit transition
#[derive(Debug, Deserialize, Validate)]
pub struct StartTransitRequest {
    pub transporter_id: Uuid,
    #[validate(length(min = 1, message = "transporter name is required"))]
    pub transporter_name: String,
}

/// How a trip resolves at settlement
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettleOutcome {
    Completed,
    Defaulted,
}

/// Request DTO for settlement
#[derive(Debug, Deserialize)]
pub struct SettleTripRequest {
    pub outcome: SettleOutcome,
}

/// Narrow metadata patch; state-machine fields move only through named
/// transition operations.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTripMetadataRequest {
    pub client_company: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub insurance_status: Option<bool>,
}

/// Query parameters for listing trips
#[derive(Debug, Deserialize)]
pub struct ListTripsQuery {
    pub status: Option<TripStatus>,
    pub load_owner_id: Option<Uuid>,
    pub lender_id: Option<Uuid>,
}

/// Result of a successful allotment
#[derive(Debug, Serialize)]
pub struct Allotment {
    pub trip: Trip,
    pub investment: Investment,
}

/// Result of a settlement
#[derive(Debug, Serialize)]
pub struct Settlement {
    pub trip: Trip,
    pub investment: Investment,
    pub lender_wallet: Wallet,
    pub borrower_wallet: Wallet,
}

/// Result of placing a bid: the bid row plus the escrowed investment created
/// with it.
#[derive(Debug, Serialize)]
pub struct PlacedBid {
    pub bid: Bid,
    pub investment: Investment,
}
