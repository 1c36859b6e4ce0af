//! Reconciliation review and claim workflow tests

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use freightfin_server::error::ApiError;
    use freightfin_server::reconciliation::{
        ApproveClaimRequest, CreateReconciliationRequest, ReconciliationService,
        ReconciliationStatus, RequestClaimRequest, ReviewReconciliationRequest,
    };

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/freightfin_test".to_string());

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    struct Actors {
        transporter: Uuid,
        trust_account: Uuid,
        lender: Uuid,
        trip: Uuid,
    }

    fn actors() -> Actors {
        Actors {
            transporter: Uuid::new_v4(),
            trust_account: Uuid::new_v4(),
            lender: Uuid::new_v4(),
            trip: Uuid::new_v4(),
        }
    }

    fn create_request(a: &Actors) -> CreateReconciliationRequest {
        CreateReconciliationRequest {
            transporter_id: a.transporter,
            transporter_name: "Fast Haulage".to_string(),
            trust_account_id: a.trust_account,
            trust_account_name: "Settlement Desk".to_string(),
            trip_ids: vec![a.trip],
            lender_id: Some(a.lender),
            lender_name: Some("Capital Partner".to_string()),
            document_name: "settlement-statement.pdf".to_string(),
            document_type: "application/pdf".to_string(),
            document_size: 2048,
            document_data: "JVBERi0xLjQ=".to_string(),
            description: Some("March settlement".to_string()),
            reconciliation_amount: Some(75_000),
            reconciliation_date: None,
        }
    }

    fn review(reviewer_id: Uuid, status: ReconciliationStatus) -> ReviewReconciliationRequest {
        ReviewReconciliationRequest {
            reviewer_id,
            status,
            review_notes: Some("Checked against trip records".to_string()),
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_submission_starts_pending() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();
        assert_eq!(rec.status, ReconciliationStatus::Pending);
        assert!(!rec.claim_requested);
        assert!(!rec.lender_approved);

        let listed = service.list_for_transporter(a.transporter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, rec.id);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_only_addressed_trust_account_can_review() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();

        let err = service
            .review(rec.id, review(Uuid::new_v4(), ReconciliationStatus::Approved))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_rejection_requires_notes() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();

        let err = service
            .review(
                rec.id,
                ReviewReconciliationRequest {
                    reviewer_id: a.trust_account,
                    status: ReconciliationStatus::Rejected,
                    review_notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_resolved_verdict_cannot_be_revisited() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();
        service
            .review(rec.id, review(a.trust_account, ReconciliationStatus::Approved))
            .await
            .unwrap();

        let err = service
            .review(rec.id, review(a.trust_account, ReconciliationStatus::Rejected))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_claim_requires_approved_reconciliation() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();

        let err = service
            .request_claim(
                rec.id,
                RequestClaimRequest {
                    transporter_id: a.transporter,
                    trip_id: a.trip,
                    lender_id: a.lender,
                    lender_name: "Capital Partner".to_string(),
                    lender_claim_amount: 60_000,
                    transporter_claim_amount: 15_000,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_claim_rejects_trip_outside_reconciliation() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();
        service
            .review(rec.id, review(a.trust_account, ReconciliationStatus::Approved))
            .await
            .unwrap();

        let err = service
            .request_claim(
                rec.id,
                RequestClaimRequest {
                    transporter_id: a.transporter,
                    trip_id: Uuid::new_v4(),
                    lender_id: a.lender,
                    lender_name: "Capital Partner".to_string(),
                    lender_claim_amount: 60_000,
                    transporter_claim_amount: 15_000,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let current = service.get(rec.id).await.unwrap().unwrap();
        assert!(!current.claim_requested);
        assert_eq!(current.claim_trip_id, None);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_full_claim_workflow() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();
        service
            .review(rec.id, review(a.trust_account, ReconciliationStatus::Approved))
            .await
            .unwrap();

        // Only the submitting transporter may raise the claim
        let err = service
            .request_claim(
                rec.id,
                RequestClaimRequest {
                    transporter_id: Uuid::new_v4(),
                    trip_id: a.trip,
                    lender_id: a.lender,
                    lender_name: "Capital Partner".to_string(),
                    lender_claim_amount: 60_000,
                    transporter_claim_amount: 15_000,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let claimed = service
            .request_claim(
                rec.id,
                RequestClaimRequest {
                    transporter_id: a.transporter,
                    trip_id: a.trip,
                    lender_id: a.lender,
                    lender_name: "Capital Partner".to_string(),
                    lender_claim_amount: 60_000,
                    transporter_claim_amount: 15_000,
                },
            )
            .await
            .unwrap();
        assert!(claimed.claim_requested);
        assert_eq!(claimed.claim_trip_id, Some(a.trip));
        assert_eq!(claimed.claim_amount, Some(75_000));

        // Raising it twice fails
        let err = service
            .request_claim(
                rec.id,
                RequestClaimRequest {
                    transporter_id: a.transporter,
                    trip_id: a.trip,
                    lender_id: a.lender,
                    lender_name: "Capital Partner".to_string(),
                    lender_claim_amount: 60_000,
                    transporter_claim_amount: 15_000,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        // Visible to the lender as a pending claim
        let pending = service.pending_claims(a.lender).await.unwrap();
        assert_eq!(pending.len(), 1);

        // Wrong lender cannot approve
        let err = service
            .approve_claim(
                rec.id,
                ApproveClaimRequest {
                    lender_id: Uuid::new_v4(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let approved = service
            .approve_claim(rec.id, ApproveClaimRequest { lender_id: a.lender })
            .await
            .unwrap();
        assert!(approved.lender_approved);
        assert!(approved.lender_approved_at.is_some());
        assert!(approved.payment_notification_sent);
        assert!(approved.payment_notification_message.is_some());

        // Approved claims leave the pending list
        let pending = service.pending_claims(a.lender).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_delete_limited_to_unclaimed_submissions() {
        let db_pool = setup_test_db().await;
        let service = ReconciliationService::new(db_pool);
        let a = actors();

        let rec = service.create(create_request(&a)).await.unwrap();

        // Only the creator may delete
        let err = service.delete(rec.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        service.delete(rec.id, a.transporter).await.unwrap();
        assert!(service.get(rec.id).await.unwrap().is_none());

        // Approved submissions cannot be deleted
        let rec = service.create(create_request(&a)).await.unwrap();
        service
            .review(rec.id, review(a.trust_account, ReconciliationStatus::Approved))
            .await
            .unwrap();
        let err = service.delete(rec.id, a.transporter).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }
}
