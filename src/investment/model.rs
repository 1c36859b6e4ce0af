//! Investment models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Investment status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "investment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Escrowed,
    Active,
    Completed,
    Defaulted,
}

/// Investment model, exactly one per allotted (trip, lender) pair.
///
/// `interest_rate` is the lender's original bid rate, distinct from the
/// marked-up shipper-facing rate stored on the trip.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Investment {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub trip_id: Uuid,
    pub amount: i64,
    pub interest_rate: f64,
    pub expected_return: i64,
    pub status: InvestmentStatus,
    pub invested_at: DateTime<Utc>,
    pub maturity_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Query for listing investments
#[derive(Debug, Deserialize)]
pub struct ListInvestmentsQuery {
    pub lender_id: Option<Uuid>,
    pub trip_id: Option<Uuid>,
    pub status: Option<InvestmentStatus>,
}
