//! Reconciliation service - document submission, trust-account review and
//! the lender claim workflow.

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::reconciliation::{
    ApproveClaimRequest, CreateReconciliationRequest, Reconciliation, ReconciliationStatus,
    RequestClaimRequest, ReviewReconciliationRequest,
};

/// Message placed on a claim when the lender approves it
const PAYMENT_NOTIFICATION_MESSAGE: &str = "Within 24 hours you will receive an approval request \
     in the trust account. Please approve it to complete the payment process.";

/// Reconciliation service for settlement documents and claims
#[derive(Clone)]
pub struct ReconciliationService {
    db_pool: PgPool,
}

impl ReconciliationService {
    /// Create a new reconciliation service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Submit a reconciliation document for review
    pub async fn create(&self, request: CreateReconciliationRequest) -> ApiResult<Reconciliation> {
        request.validate()?;

        let reconciliation = sqlx::query_as::<_, Reconciliation>(
            r#"
            INSERT INTO reconciliations (
                id, transporter_id, transporter_name, trust_account_id, trust_account_name,
                trip_ids, lender_id, lender_name, document_name, document_type, document_size,
                document_data, description, reconciliation_amount, reconciliation_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.transporter_id)
        .bind(&request.transporter_name)
        .bind(request.trust_account_id)
        .bind(&request.trust_account_name)
        .bind(&request.trip_ids)
        .bind(request.lender_id)
        .bind(&request.lender_name)
        .bind(&request.document_name)
        .bind(&request.document_type)
        .bind(request.document_size)
        .bind(&request.document_data)
        .bind(&request.description)
        .bind(request.reconciliation_amount)
        .bind(request.reconciliation_date)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            reconciliation_id = %reconciliation.id,
            transporter_id = %reconciliation.transporter_id,
            "Reconciliation submitted"
        );

        Ok(reconciliation)
    }

    /// Get a single reconciliation by ID
    pub async fn get(&self, id: Uuid) -> ApiResult<Option<Reconciliation>> {
        let reconciliation =
            sqlx::query_as::<_, Reconciliation>("SELECT * FROM reconciliations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(reconciliation)
    }

    /// Reconciliations a transporter has submitted, newest first
    pub async fn list_for_transporter(&self, transporter_id: Uuid) -> ApiResult<Vec<Reconciliation>> {
        let reconciliations = sqlx::query_as::<_, Reconciliation>(
            "SELECT * FROM reconciliations WHERE transporter_id = $1 ORDER BY created_at DESC",
        )
        .bind(transporter_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(reconciliations)
    }

    /// Reconciliations addressed to a trust account, newest first
    pub async fn list_for_trust_account(
        &self,
        trust_account_id: Uuid,
    ) -> ApiResult<Vec<Reconciliation>> {
        let reconciliations = sqlx::query_as::<_, Reconciliation>(
            "SELECT * FROM reconciliations WHERE trust_account_id = $1 ORDER BY created_at DESC",
        )
        .bind(trust_account_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(reconciliations)
    }

    /// Claims awaiting a lender's approval
    pub async fn pending_claims(&self, lender_id: Uuid) -> ApiResult<Vec<Reconciliation>> {
        let claims = sqlx::query_as::<_, Reconciliation>(
            r#"
            SELECT * FROM reconciliations
            WHERE lender_id = $1 AND claim_requested AND NOT lender_approved
            ORDER BY claim_requested_at DESC
            "#,
        )
        .bind(lender_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(claims)
    }

    /// Record the trust account's verdict on a pending document.
    ///
    /// Only the addressed trust account may review; a rejection must carry
    /// notes. A reviewed document may still be upgraded to approved or
    /// rejected, but a final verdict cannot be revisited.
    pub async fn review(
        &self,
        id: Uuid,
        request: ReviewReconciliationRequest,
    ) -> ApiResult<Reconciliation> {
        if request.status == ReconciliationStatus::Pending {
            return Err(ApiError::Validation(
                "Review status must be reviewed, approved or rejected".to_string(),
            ));
        }
        if request.status == ReconciliationStatus::Rejected
            && request
                .review_notes
                .as_deref()
                .map_or(true, |n| n.trim().is_empty())
        {
            return Err(ApiError::Validation(
                "Review notes are required when rejecting".to_string(),
            ));
        }

        let mut tx = self.db_pool.begin().await?;

        let current = Self::lock(&mut tx, id).await?;
        if current.trust_account_id != request.reviewer_id {
            return Err(ApiError::Unauthorized(
                "Only the addressed trust account can review this reconciliation".to_string(),
            ));
        }
        if !matches!(
            current.status,
            ReconciliationStatus::Pending | ReconciliationStatus::Reviewed
        ) {
            return Err(ApiError::InvalidState(format!(
                "reconciliation already resolved as {:?}",
                current.status
            )));
        }

        let reconciliation = sqlx::query_as::<_, Reconciliation>(
            r#"
            UPDATE reconciliations
            SET status = $1,
                review_notes = $2,
                reviewed_by = $3,
                reviewed_at = NOW(),
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(request.status)
        .bind(&request.review_notes)
        .bind(request.reviewer_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            reconciliation_id = %id,
            status = ?request.status,
            "Reconciliation reviewed"
        );

        Ok(reconciliation)
    }

    /// Raise a claim against an approved reconciliation.
    ///
    /// Only the submitting transporter may raise it, only once, and only
    /// after the trust account has approved the document.
    pub async fn request_claim(
        &self,
        id: Uuid,
        request: RequestClaimRequest,
    ) -> ApiResult<Reconciliation> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let current = Self::lock(&mut tx, id).await?;
        if current.transporter_id != request.transporter_id {
            return Err(ApiError::Unauthorized(
                "Only the submitting transporter can raise a claim".to_string(),
            ));
        }
        if current.status != ReconciliationStatus::Approved {
            return Err(ApiError::InvalidState(
                "claims require an approved reconciliation".to_string(),
            ));
        }
        if current.claim_requested {
            return Err(ApiError::InvalidState(
                "a claim has already been raised on this reconciliation".to_string(),
            ));
        }
        if !current.trip_ids.contains(&request.trip_id) {
            return Err(ApiError::Validation(
                "trip is not covered by this reconciliation".to_string(),
            ));
        }

        let claim_amount = request.lender_claim_amount + request.transporter_claim_amount;

        let reconciliation = sqlx::query_as::<_, Reconciliation>(
            r#"
            UPDATE reconciliations
            SET claim_requested = TRUE,
                claim_requested_at = NOW(),
                claim_trip_id = $1,
                lender_id = $2,
                lender_name = $3,
                lender_claim_amount = $4,
                transporter_claim_amount = $5,
                claim_amount = $6,
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(request.trip_id)
        .bind(request.lender_id)
        .bind(&request.lender_name)
        .bind(request.lender_claim_amount)
        .bind(request.transporter_claim_amount)
        .bind(claim_amount)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            reconciliation_id = %id,
            claim_amount,
            "Claim requested"
        );

        Ok(reconciliation)
    }

    /// Lender approval of a raised claim; marks the payment notification sent
    pub async fn approve_claim(
        &self,
        id: Uuid,
        request: ApproveClaimRequest,
    ) -> ApiResult<Reconciliation> {
        let mut tx = self.db_pool.begin().await?;

        let current = Self::lock(&mut tx, id).await?;
        if current.lender_id != Some(request.lender_id) {
            return Err(ApiError::Unauthorized(
                "Only the named lender can approve this claim".to_string(),
            ));
        }
        if !current.claim_requested {
            return Err(ApiError::InvalidState(
                "no claim has been raised on this reconciliation".to_string(),
            ));
        }
        if current.lender_approved {
            return Err(ApiError::InvalidState(
                "claim has already been approved".to_string(),
            ));
        }

        let reconciliation = sqlx::query_as::<_, Reconciliation>(
            r#"
            UPDATE reconciliations
            SET lender_approved = TRUE,
                lender_approved_at = NOW(),
                payment_notification_sent = TRUE,
                payment_notification_message = $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(PAYMENT_NOTIFICATION_MESSAGE)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(reconciliation_id = %id, "Claim approved by lender");

        Ok(reconciliation)
    }

    /// Withdraw a submission that has not entered the claim flow
    pub async fn delete(&self, id: Uuid, transporter_id: Uuid) -> ApiResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let current = Self::lock(&mut tx, id).await?;
        if current.transporter_id != transporter_id {
            return Err(ApiError::Unauthorized(
                "Only the submitting transporter can delete this reconciliation".to_string(),
            ));
        }
        if current.claim_requested
            || !matches!(
                current.status,
                ReconciliationStatus::Pending | ReconciliationStatus::Rejected
            )
        {
            return Err(ApiError::InvalidState(
                "only pending or rejected reconciliations without claims can be deleted"
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM reconciliations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn lock(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> ApiResult<Reconciliation> {
        sqlx::query_as::<_, Reconciliation>(
            "SELECT * FROM reconciliations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reconciliation not found".to_string()))
    }
}
