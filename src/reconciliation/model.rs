use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Review verdict lifecycle for a reconciliation document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reconciliation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Pending,
    Reviewed,
    Approved,
    Rejected,
}

/// A settlement document submitted by a transporter for trust-account review
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reconciliation {
    pub id: Uuid,
    pub transporter_id: Uuid,
    pub transporter_name: String,
    pub trust_account_id: Uuid,
    pub trust_account_name: String,
    pub trip_ids: Vec<Uuid>,
    pub lender_id: Option<Uuid>,
    pub lender_name: Option<String>,
    pub document_name: String,
    pub document_type: String,
    pub document_size: i64,
    pub document_data: String,
    pub description: Option<String>,
    pub reconciliation_amount: Option<i64>,
    pub reconciliation_date: Option<DateTime<Utc>>,
    pub status: ReconciliationStatus,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub claim_requested: bool,
    pub claim_requested_at: Option<DateTime<Utc>>,
    pub claim_trip_id: Option<Uuid>,
    pub lender_claim_amount: Option<i64>,
    pub transporter_claim_amount: Option<i64>,
    pub claim_amount: Option<i64>,
    pub lender_approved: bool,
    pub lender_approved_at: Option<DateTime<Utc>>,
    pub payment_notification_sent: bool,
    pub payment_notification_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReconciliationRequest {
    pub transporter_id: Uuid,
    #[validate(length(min = 1, message = "Transporter name is required"))]
    pub transporter_name: String,
    pub trust_account_id: Uuid,
    #[validate(length(min = 1, message = "Trust account name is required"))]
    pub trust_account_name: String,
    #[serde(default)]
    pub trip_ids: Vec<Uuid>,
    pub lender_id: Option<Uuid>,
    pub lender_name: Option<String>,
    #[validate(length(min = 1, message = "Document name is required"))]
    pub document_name: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub document_size: i64,
    #[validate(length(min = 1, message = "Document data is required"))]
    pub document_data: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Reconciliation amount must be positive"))]
    pub reconciliation_amount: Option<i64>,
    pub reconciliation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewReconciliationRequest {
    pub reviewer_id: Uuid,
    pub status: ReconciliationStatus,
    pub review_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestClaimRequest {
    pub transporter_id: Uuid,
    pub trip_id: Uuid,
    pub lender_id: Uuid,
    #[validate(length(min = 1, message = "Lender name is required"))]
    pub lender_name: String,
    #[validate(range(min = 1, message = "Lender claim amount must be positive"))]
    pub lender_claim_amount: i64,
    #[validate(range(min = 0, message = "Transporter claim amount cannot be negative"))]
    pub transporter_claim_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveClaimRequest {
    pub lender_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DeleteReconciliationRequest {
    pub transporter_id: Uuid,
}
