//! Trip service layer - lifecycle, bidding, allotment and settlement
//!
//! Every multi-entity operation runs inside one database transaction with the
//! trip row locked first, so concurrent attempts on the same trip serialize
//! and exactly one allotment can win.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AllotmentStage, ApiError, ApiResult};
use crate::investment::{Investment, InvestmentStatus};
use crate::trip::{
    shipper_rate, Allotment, Bid, CreateTripRequest, ListTripsQuery, PlaceBidRequest, PlacedBid,
    RiskLevel, SettleOutcome, Settlement, Trip, TripStatus, UpdateTripMetadataRequest,
};
use crate::wallet::{EntryCategory, WalletService};

/// Trip service for managing the financing lifecycle
#[derive(Clone)]
pub struct TripService {
    db_pool: PgPool,
}

impl TripService {
    /// Create a new trip service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create a trip open for bidding
    pub async fn create_trip(&self, request: CreateTripRequest) -> ApiResult<Trip> {
        request.validate()?;

        let trip = sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trips (
                id, load_owner_id, load_owner_name, client_company, origin, destination,
                distance, weight, load_type, amount, maturity_days, risk_level,
                insurance_status, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.load_owner_id)
        .bind(&request.load_owner_name)
        .bind(&request.client_company)
        .bind(&request.origin)
        .bind(&request.destination)
        .bind(request.distance)
        .bind(request.weight)
        .bind(&request.load_type)
        .bind(request.amount)
        .bind(request.maturity_days.unwrap_or(30))
        .bind(request.risk_level.unwrap_or(RiskLevel::Low))
        .bind(request.insurance_status.unwrap_or(false))
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(trip_id = %trip.id, amount = trip.amount, "Trip created");

        Ok(trip)
    }

    /// Get a single trip by ID
    pub async fn get_trip(&self, id: Uuid) -> ApiResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(trip)
    }

    /// List trips with optional filters
    pub async fn list_trips(&self, query: ListTripsQuery) -> ApiResult<Vec<Trip>> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM trips WHERE 1=1");

        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(load_owner_id) = query.load_owner_id {
            builder.push(" AND load_owner_id = ");
            builder.push_bind(load_owner_id);
        }
        if let Some(lender_id) = query.lender_id {
            builder.push(" AND lender_id = ");
            builder.push_bind(lender_id);
        }

        builder.push(" ORDER BY created_at DESC");

        let trips = builder
            .build_query_as::<Trip>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(trips)
    }

    /// Bids on a trip, newest first
    pub async fn bids(&self, trip_id: Uuid) -> ApiResult<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(
            "SELECT * FROM trip_bids WHERE trip_id = $1 ORDER BY created_at DESC",
        )
        .bind(trip_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(bids)
    }

    /// Place a bid on a trip.
    ///
    /// One transaction: the bid row, the lender's escrow move and the escrowed
    /// investment are created together; the first bid takes the trip from
    /// pending to escrowed.
    pub async fn place_bid(&self, trip_id: Uuid, request: PlaceBidRequest) -> ApiResult<PlacedBid> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let trip = Self::lock_trip(&mut tx, trip_id).await?;
        if !matches!(trip.status, TripStatus::Pending | TripStatus::Escrowed) {
            return Err(ApiError::InvalidState(format!(
                "trip is not open for bidding (status {:?})",
                trip.status
            )));
        }

        let existing = sqlx::query_as::<_, Bid>(
            "SELECT * FROM trip_bids WHERE trip_id = $1 AND lender_id = $2",
        )
        .bind(trip_id)
        .bind(request.lender_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(ApiError::InvalidState(
                "lender has already bid on this trip".to_string(),
            ));
        }

        let bid = sqlx::query_as::<_, Bid>(
            r#"
            INSERT INTO trip_bids (id, trip_id, lender_id, lender_name, amount, interest_rate)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trip_id)
        .bind(request.lender_id)
        .bind(&request.lender_name)
        .bind(request.amount)
        .bind(request.interest_rate)
        .fetch_one(&mut *tx)
        .await?;

        WalletService::move_to_escrow_tx(
            &mut tx,
            request.lender_id,
            request.amount,
            &format!(
                "Escrowed {} for bid on trip {} -> {}",
                request.amount, trip.origin, trip.destination
            ),
        )
        .await?;

        // Interest the lender stands to earn at the bid rate; principal is
        // tracked separately on the wallet.
        let expected_return =
            (request.amount as f64 * request.interest_rate / 100.0).round() as i64;
        let maturity_date = Utc::now() + Duration::days(trip.maturity_days as i64);

        let investment = sqlx::query_as::<_, Investment>(
            r#"
            INSERT INTO investments (
                id, lender_id, trip_id, amount, interest_rate, expected_return,
                status, maturity_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'escrowed', $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.lender_id)
        .bind(trip_id)
        .bind(request.amount)
        .bind(request.interest_rate)
        .bind(expected_return)
        .bind(maturity_date)
        .fetch_one(&mut *tx)
        .await?;

        if trip.status == TripStatus::Pending {
            sqlx::query("UPDATE trips SET status = 'escrowed' WHERE id = $1")
                .bind(trip_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            trip_id = %trip_id,
            lender_id = %request.lender_id,
            amount = request.amount,
            "Bid placed with escrowed investment"
        );

        Ok(PlacedBid { bid, investment })
    }

    /// Accept one lender's bid, finalizing the loan terms and moving funds.
    ///
    /// Steps 2-7 of the orchestration commit or abort as one unit; any
    /// mutation failure rolls the whole transaction back and surfaces as
    /// `AllotmentFailed` with the stage it died in. A trip can be allotted at
    /// most once: the trip row lock plus the status guard give
    /// compare-and-swap semantics, so of two concurrent attempts exactly one
    /// wins and the loser sees `AlreadyAllotted`.
    pub async fn allot_trip(&self, trip_id: Uuid, lender_id: Uuid) -> ApiResult<Allotment> {
        let mut tx = self.db_pool.begin().await?;

        let trip = Self::lock_trip(&mut tx, trip_id).await?;
        match trip.status {
            TripStatus::Pending | TripStatus::Escrowed => {}
            TripStatus::Funded | TripStatus::InTransit | TripStatus::Completed => {
                return Err(ApiError::AlreadyAllotted);
            }
            TripStatus::Cancelled => {
                return Err(ApiError::InvalidState("trip is cancelled".to_string()));
            }
        }

        let bid = sqlx::query_as::<_, Bid>(
            "SELECT * FROM trip_bids WHERE trip_id = $1 AND lender_id = $2",
        )
        .bind(trip_id)
        .bind(lender_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("no bid from this lender on this trip".to_string()))?;

        sqlx::query_as::<_, Investment>(
            "SELECT * FROM investments WHERE trip_id = $1 AND lender_id = $2 AND status = 'escrowed' FOR UPDATE",
        )
        .bind(trip_id)
        .bind(lender_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::InvalidState("no escrowed investment for this bid".to_string())
        })?;

        // Shipper rate from the original bid figures, before anything mutates.
        let rate = shipper_rate(bid.interest_rate, trip.maturity_days);

        let trip = sqlx::query_as::<_, Trip>(
            r#"
            UPDATE trips
            SET status = 'funded',
                lender_id = $1,
                lender_name = $2,
                interest_rate = $3,
                funded_at = NOW()
            WHERE id = $4 AND status IN ('pending', 'escrowed')
            RETURNING *
            "#,
        )
        .bind(bid.lender_id)
        .bind(&bid.lender_name)
        .bind(rate)
        .bind(trip_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ApiError::from(e).at_stage(AllotmentStage::TripTransition))?
        .ok_or(ApiError::AlreadyAllotted)?;

        let investment = sqlx::query_as::<_, Investment>(
            r#"
            UPDATE investments
            SET status = 'active', invested_at = NOW()
            WHERE trip_id = $1 AND lender_id = $2 AND status = 'escrowed'
            RETURNING *
            "#,
        )
        .bind(trip_id)
        .bind(lender_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ApiError::from(e).at_stage(AllotmentStage::InvestmentActivation))?
        .ok_or_else(|| {
            ApiError::InvalidState("no escrowed investment for this bid".to_string())
                .at_stage(AllotmentStage::InvestmentActivation)
        })?;

        WalletService::invest_tx(
            &mut tx,
            bid.lender_id,
            bid.amount,
            &format!(
                "Invested {} in trip {} -> {} (Borrower: {})",
                bid.amount, trip.origin, trip.destination, trip.load_owner_name
            ),
        )
        .await
        .map_err(|e| e.at_stage(AllotmentStage::LenderDebit))?;

        WalletService::credit_tx(
            &mut tx,
            trip.load_owner_id,
            bid.amount,
            EntryCategory::Payment,
            &format!(
                "Received {} from {} for trip {} -> {}",
                bid.amount, bid.lender_name, trip.origin, trip.destination
            ),
        )
        .await
        .map_err(|e| e.at_stage(AllotmentStage::BorrowerCredit))?;

        Self::refund_losing_bids(&mut tx, &trip, Some(lender_id))
            .await
            .map_err(|e| e.at_stage(AllotmentStage::BidRefund))?;

        tx.commit().await?;

        tracing::info!(
            trip_id = %trip_id,
            lender_id = %lender_id,
            amount = bid.amount,
            shipper_rate = rate,
            "Trip allotted"
        );

        Ok(Allotment { trip, investment })
    }

    /// funded -> in_transit, recording the transporter
    pub async fn start_transit(
        &self,
        trip_id: Uuid,
        transporter_id: Uuid,
        transporter_name: &str,
    ) -> ApiResult<Trip> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            UPDATE trips
            SET status = 'in_transit', transporter_id = $1, transporter_name = $2
            WHERE id = $3 AND status = 'funded'
            RETURNING *
            "#,
        )
        .bind(transporter_id)
        .bind(transporter_name)
        .bind(trip_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match trip {
            Some(trip) => Ok(trip),
            None => {
                let existing = self.get_trip(trip_id).await?;
                match existing {
                    Some(t) => Err(ApiError::InvalidState(format!(
                        "trip must be funded to start transit (status {:?})",
                        t.status
                    ))),
                    None => Err(ApiError::NotFound("Trip not found".to_string())),
                }
            }
        }
    }

    /// Settle a funded or in-transit trip.
    ///
    /// On `completed`, the borrower repays principal plus interest at the
    /// investment's (lender bid) rate and the lender's principal comes back
    /// with returns. On `defaulted`, no cash moves; the lender's invested
    /// principal is written off. Either way the trip reaches `completed` and
    /// the investment resolves, in one transaction.
    pub async fn settle_trip(&self, trip_id: Uuid, outcome: SettleOutcome) -> ApiResult<Settlement> {
        let mut tx = self.db_pool.begin().await?;

        let trip = Self::lock_trip(&mut tx, trip_id).await?;
        if !matches!(trip.status, TripStatus::Funded | TripStatus::InTransit) {
            return Err(ApiError::InvalidState(format!(
                "trip cannot be settled from status {:?}",
                trip.status
            )));
        }
        let lender_id = trip
            .lender_id
            .ok_or_else(|| ApiError::InvalidState("funded trip has no lender".to_string()))?;

        let status = match outcome {
            SettleOutcome::Completed => InvestmentStatus::Completed,
            SettleOutcome::Defaulted => InvestmentStatus::Defaulted,
        };
        let investment = sqlx::query_as::<_, Investment>(
            r#"
            UPDATE investments
            SET status = $1, completed_at = NOW()
            WHERE trip_id = $2 AND lender_id = $3 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(trip_id)
        .bind(lender_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::InvalidState("no active investment for this trip".to_string())
        })?;

        let interest = (investment.amount as f64 * investment.interest_rate / 100.0).round() as i64;

        let (lender_wallet, borrower_wallet) = match outcome {
            SettleOutcome::Completed => {
                let borrower = WalletService::debit_tx(
                    &mut tx,
                    trip.load_owner_id,
                    investment.amount + interest,
                    EntryCategory::Payment,
                    &format!(
                        "Repayment made for trip {} -> {}: {} principal + {} interest",
                        trip.origin, trip.destination, investment.amount, interest
                    ),
                )
                .await?;
                let lender = WalletService::return_investment_tx(
                    &mut tx,
                    lender_id,
                    investment.amount,
                    interest,
                    &format!(
                        "Repayment received for trip {} -> {}: {} principal + {} interest",
                        trip.origin, trip.destination, investment.amount, interest
                    ),
                )
                .await?;
                (lender, borrower)
            }
            SettleOutcome::Defaulted => {
                let lender = WalletService::write_off_tx(
                    &mut tx,
                    lender_id,
                    investment.amount,
                    &format!(
                        "Investment written off: trip {} -> {} defaulted",
                        trip.origin, trip.destination
                    ),
                )
                .await?;
                let borrower = WalletService::lock_wallet(&mut tx, trip.load_owner_id).await?;
                (lender, borrower)
            }
        };

        let trip = sqlx::query_as::<_, Trip>(
            r#"
            UPDATE trips
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(trip_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            trip_id = %trip_id,
            outcome = ?outcome,
            principal = investment.amount,
            interest,
            "Trip settled"
        );

        Ok(Settlement {
            trip,
            investment,
            lender_wallet,
            borrower_wallet,
        })
    }

    /// Cancel a trip that has not been funded, refunding every escrowed bid
    pub async fn cancel_trip(&self, trip_id: Uuid) -> ApiResult<Trip> {
        let mut tx = self.db_pool.begin().await?;

        let trip = Self::lock_trip(&mut tx, trip_id).await?;
        match trip.status {
            TripStatus::Pending | TripStatus::Escrowed => {}
            // Once funds are disbursed there is nothing to unwind here; the
            // trip resolves through settlement instead.
            TripStatus::Funded | TripStatus::InTransit => {
                return Err(ApiError::InvalidState(format!(
                    "a funded trip is resolved through settlement, not cancellation (status {:?})",
                    trip.status
                )));
            }
            TripStatus::Completed | TripStatus::Cancelled => {
                return Err(ApiError::InvalidState(format!(
                    "trip is already {:?}",
                    trip.status
                )));
            }
        }

        Self::refund_losing_bids(&mut tx, &trip, None).await?;

        let trip = sqlx::query_as::<_, Trip>(
            "UPDATE trips SET status = 'cancelled' WHERE id = $1 RETURNING *",
        )
        .bind(trip_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(trip_id = %trip_id, "Trip cancelled");

        Ok(trip)
    }

    /// Patch non-state fields only
    pub async fn update_trip_metadata(
        &self,
        trip_id: Uuid,
        request: UpdateTripMetadataRequest,
    ) -> ApiResult<Trip> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            UPDATE trips
            SET client_company = COALESCE($1, client_company),
                risk_level = COALESCE($2, risk_level),
                insurance_status = COALESCE($3, insurance_status)
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&request.client_company)
        .bind(request.risk_level)
        .bind(request.insurance_status)
        .bind(trip_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))?;

        Ok(trip)
    }

    /// Delete a trip; rejected while bids or investments reference it
    pub async fn delete_trip(&self, trip_id: Uuid) -> ApiResult<()> {
        let mut tx = self.db_pool.begin().await?;

        Self::lock_trip(&mut tx, trip_id).await?;

        let (references,): (i64,) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM trip_bids WHERE trip_id = $1)
                 + (SELECT COUNT(*) FROM investments WHERE trip_id = $1)
            "#,
        )
        .bind(trip_id)
        .fetch_one(&mut *tx)
        .await?;

        if references > 0 {
            return Err(ApiError::InvalidState(
                "trip has bids or investments and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    // ===== Private helpers =====

    async fn lock_trip(tx: &mut Transaction<'_, Postgres>, trip_id: Uuid) -> ApiResult<Trip> {
        sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1 FOR UPDATE")
            .bind(trip_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))
    }

    /// Refund every escrowed investment on the trip except the winner's,
    /// returning the funds to the lenders' balances. The refunded investment
    /// rows never activated and are removed; the refund ledger entries keep
    /// the audit trail.
    async fn refund_losing_bids(
        tx: &mut Transaction<'_, Postgres>,
        trip: &Trip,
        winner: Option<Uuid>,
    ) -> ApiResult<()> {
        let losers = sqlx::query_as::<_, Investment>(
            r#"
            SELECT * FROM investments
            WHERE trip_id = $1 AND status = 'escrowed' AND ($2::uuid IS NULL OR lender_id <> $2)
            "#,
        )
        .bind(trip.id)
        .bind(winner)
        .fetch_all(&mut **tx)
        .await?;

        for investment in losers {
            WalletService::release_escrow_tx(
                tx,
                investment.lender_id,
                investment.amount,
                &format!(
                    "Refunded {} escrowed for trip {} -> {}",
                    investment.amount, trip.origin, trip.destination
                ),
            )
            .await?;

            sqlx::query("DELETE FROM investments WHERE id = $1")
                .bind(investment.id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}
