//! Trip lifecycle, allotment and settlement tests

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use freightfin_server::error::ApiError;
    use freightfin_server::investment::InvestmentStatus;
    use freightfin_server::trip::{
        CreateTripRequest, PlaceBidRequest, SettleOutcome, TripService, TripStatus,
    };
    use freightfin_server::wallet::{replay_balance, EntryCategory, EntryType, WalletService};

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

    fn create_trip_request(load_owner_id: Uuid, amount: i64) -> CreateTripRequest {
        CreateTripRequest {
            load_owner_id,
            load_owner_name: "Acme Loads".to_string(),
            client_company: Some("Acme Inc".to_string()),
            origin: "Mumbai".to_string(),
            destination: "Delhi".to_string(),
            distance: 1400.0,
            weight: 12.5,
            load_type: "Steel coils".to_string(),
            amount,
            maturity_days: Some(30),
            risk_level: None,
            insurance_status: Some(true),
        }
    }

    fn bid_request(lender_id: Uuid, amount: i64, rate: f64) -> PlaceBidRequest {
        PlaceBidRequest {
            lender_id,
            lender_name: "Capital Partner".to_string(),
            amount,
            interest_rate: rate,
        }
    }

    /// Total cash under management across users. Conserved by every
    /// lifecycle operation: escrow and disbursal only move cash between
    /// wallets, and settlement moves repayment the same way.
    async fn total_cash(wallets: &WalletService, users: &[Uuid]) -> i64 {
        let mut total = 0;
        for user in users {
            let w = wallets.get_wallet(*user).await.unwrap();
            total += w.balance + w.escrowed_amount;
        }
        total
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_bid_escrows_funds_and_flips_trip_status() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Pending);
        assert_eq!(trip.interest_rate, None);

        let placed = trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        assert_eq!(placed.investment.status, InvestmentStatus::Escrowed);
        assert_eq!(placed.investment.expected_return, 5_000);

        let wallet = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(wallet.balance, 50_000);
        assert_eq!(wallet.escrowed_amount, 50_000);

        let trip = trips.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Escrowed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_bid_with_insufficient_funds_leaves_no_partial_state() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 10_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();

        let err = trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientFunds { .. }));

        // Whole transaction rolled back: no bid, no investment, trip untouched
        let trip = trips.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Pending);
        assert!(trips.bids(trip.id).await.unwrap().is_empty());
        let wallet = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(wallet.balance, 10_000);
        assert_eq!(wallet.escrowed_amount, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_duplicate_bid_from_same_lender_rejected() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 200_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();

        let err = trips
            .place_bid(trip.id, bid_request(lender, 50_000, 9.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_allotment_funds_trip_and_refunds_losing_bids() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        for lender in [winner, loser] {
            wallets
                .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
                .await
                .unwrap();
        }

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(winner, 50_000, 10.0))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(loser, 50_000, 11.0))
            .await
            .unwrap();

        let before = total_cash(&wallets, &[borrower, winner, loser]).await;

        let allotment = trips.allot_trip(trip.id, winner).await.unwrap();
        assert_eq!(allotment.trip.status, TripStatus::Funded);
        assert_eq!(allotment.trip.lender_id, Some(winner));
        assert!(allotment.trip.funded_at.is_some());
        assert_eq!(allotment.investment.status, InvestmentStatus::Active);

        // 10% over 30 days annualizes to ~121.67%, marked up 20% and
        // de-annualized back to a 12% period rate for the shipper.
        let rate = allotment.trip.interest_rate.unwrap();
        assert!((rate - 12.0).abs() < 1e-9);

        // Winner: escrow converted to invested principal
        let w = wallets.get_wallet(winner).await.unwrap();
        assert_eq!(w.balance, 50_000);
        assert_eq!(w.escrowed_amount, 0);
        assert_eq!(w.total_invested, 50_000);

        // Borrower: credited the full bid amount
        let b = wallets.get_wallet(borrower).await.unwrap();
        assert_eq!(b.balance, 50_000);

        // Loser: escrow refunded to the spendable balance
        let l = wallets.get_wallet(loser).await.unwrap();
        assert_eq!(l.balance, 100_000);
        assert_eq!(l.escrowed_amount, 0);

        // Funds only move and convert; nothing is created or destroyed
        let after = total_cash(&wallets, &[borrower, winner, loser]).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_allotment_aborts_whole_when_escrow_is_short() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();

        // Drain part of the escrow behind the orchestrator's back
        wallets.release_escrow(lender, 10_000).await.unwrap();

        let err = trips.allot_trip(trip.id, lender).await.unwrap_err();
        assert!(matches!(err, ApiError::AllotmentFailed { .. }));

        // Nothing survives: trip stays escrowed, investment stays escrowed,
        // the borrower was never credited
        let trip = trips.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Escrowed);
        assert_eq!(trip.lender_id, None);
        let b = wallets.get_wallet(borrower).await.unwrap();
        assert_eq!(b.balance, 0);
        let w = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(w.total_invested, 0);
        assert_eq!(w.escrowed_amount, 40_000);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_second_allotment_rejected_and_changes_nothing() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();

        let before = total_cash(&wallets, &[borrower, lender]).await;

        let err = trips.allot_trip(trip.id, lender).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyAllotted));

        let after = total_cash(&wallets, &[borrower, lender]).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_completed_repays_principal_plus_interest() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();
        // Borrower needs funds beyond the disbursal to cover interest
        wallets
            .credit(borrower, 10_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();

        let transporter = Uuid::new_v4();
        let trip_row = trips
            .start_transit(trip.id, transporter, "Fast Haulage")
            .await
            .unwrap();
        assert_eq!(trip_row.status, TripStatus::InTransit);

        let before = total_cash(&wallets, &[borrower, lender]).await;

        let settlement = trips
            .settle_trip(trip.id, SettleOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(settlement.trip.status, TripStatus::Completed);
        assert!(settlement.trip.completed_at.is_some());
        assert_eq!(settlement.investment.status, InvestmentStatus::Completed);

        // 10% of 50_000 principal
        assert_eq!(settlement.lender_wallet.balance, 105_000);
        assert_eq!(settlement.lender_wallet.total_invested, 0);
        assert_eq!(settlement.lender_wallet.total_returns, 5_000);
        assert_eq!(settlement.borrower_wallet.balance, 5_000);

        let after = total_cash(&wallets, &[borrower, lender]).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_lender_ledger_replays_through_full_lifecycle() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();
        wallets
            .credit(borrower, 10_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();
        trips
            .settle_trip(trip.id, SettleOutcome::Completed)
            .await
            .unwrap();

        let wallet = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(wallet.balance, 105_000);

        let entries = wallets.entries(lender, None).await.unwrap();
        let chronological: Vec<_> = entries.into_iter().rev().collect();

        // Top-up, escrow for the bid, conversion at allotment, repayment
        let shape: Vec<_> = chronological
            .iter()
            .map(|e| (e.entry_type, e.category))
            .collect();
        assert_eq!(
            shape,
            vec![
                (EntryType::Credit, EntryCategory::Payment),
                (EntryType::Debit, EntryCategory::Escrow),
                (EntryType::Debit, EntryCategory::Investment),
                (EntryType::Credit, EntryCategory::Return),
            ]
        );

        // Each entry's snapshot matches a replay of the log up to that point
        for (i, entry) in chronological.iter().enumerate() {
            assert_eq!(entry.balance_after, replay_balance(&chronological[..=i]));
        }
        assert_eq!(replay_balance(&chronological), wallet.balance);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_aborts_when_borrower_cannot_repay() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();

        // Borrower holds only the 50_000 disbursal; owes 55_000
        let err = trips
            .settle_trip(trip.id, SettleOutcome::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientFunds { .. }));

        // Rolled back whole: trip still funded, investment still active
        let trip = trips.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Funded);
        let w = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(w.total_invested, 50_000);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_defaulted_writes_off_without_cash() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();

        let settlement = trips
            .settle_trip(trip.id, SettleOutcome::Defaulted)
            .await
            .unwrap();
        assert_eq!(settlement.investment.status, InvestmentStatus::Defaulted);
        assert_eq!(settlement.trip.status, TripStatus::Completed);

        // Principal is gone; balances unchanged
        assert_eq!(settlement.lender_wallet.balance, 50_000);
        assert_eq!(settlement.lender_wallet.total_invested, 0);
        assert_eq!(settlement.borrower_wallet.balance, 50_000);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancel_refunds_all_escrowed_bids() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();

        let cancelled = trips.cancel_trip(trip.id).await.unwrap();
        assert_eq!(cancelled.status, TripStatus::Cancelled);

        let w = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(w.balance, 100_000);
        assert_eq!(w.escrowed_amount, 0);

        // Cancelled trips cannot be funded
        let err = trips.allot_trip(trip.id, lender).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_funded_trip_cannot_be_cancelled() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();
        trips.allot_trip(trip.id, lender).await.unwrap();

        // Disbursed funds are unwound by settlement, never by cancellation
        let err = trips.cancel_trip(trip.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        let trip = trips.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Funded);
        let w = wallets.get_wallet(lender).await.unwrap();
        assert_eq!(w.balance, 50_000);
        assert_eq!(w.total_invested, 50_000);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_delete_trip_guarded_by_references() {
        let db_pool = setup_test_db().await;
        let wallets = WalletService::new(db_pool.clone());
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let lender = Uuid::new_v4();
        wallets
            .credit(lender, 100_000, EntryCategory::Payment, "Top-up")
            .await
            .unwrap();

        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();
        trips
            .place_bid(trip.id, bid_request(lender, 50_000, 10.0))
            .await
            .unwrap();

        let err = trips.delete_trip(trip.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        // A bare trip deletes cleanly
        let bare = trips
            .create_trip(create_trip_request(borrower, 20_000))
            .await
            .unwrap();
        trips.delete_trip(bare.id).await.unwrap();
        assert!(trips.get_trip(bare.id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_transit_requires_funded_trip() {
        let db_pool = setup_test_db().await;
        let trips = TripService::new(db_pool);

        let borrower = Uuid::new_v4();
        let trip = trips
            .create_trip(create_trip_request(borrower, 50_000))
            .await
            .unwrap();

        let err = trips
            .start_transit(trip.id, Uuid::new_v4(), "Fast Haulage")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }
}
