//! Investment service layer - queries over the investment lifecycle
//!
//! Status transitions happen only inside the trip orchestrators (escrowed at
//! bid time, active at allotment, completed/defaulted at settlement), all in
//! their enclosing database transactions; this service is the read side.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::investment::{Investment, ListInvestmentsQuery};

/// Investment service
#[derive(Clone)]
pub struct InvestmentService {
    db_pool: PgPool,
}

impl InvestmentService {
    /// Create a new investment service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get investment by ID
    pub async fn get_investment(&self, id: Uuid) -> ApiResult<Option<Investment>> {
        let investment =
            sqlx::query_as::<_, Investment>("SELECT * FROM investments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(investment)
    }

    /// List investments with optional lender/trip/status filters
    pub async fn list_investments(
        &self,
        query: ListInvestmentsQuery,
    ) -> ApiResult<Vec<Investment>> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM investments WHERE 1=1");

        if let Some(lender_id) = query.lender_id {
            builder.push(" AND lender_id = ");
            builder.push_bind(lender_id);
        }
        if let Some(trip_id) = query.trip_id {
            builder.push(" AND trip_id = ");
            builder.push_bind(trip_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }

        builder.push(" ORDER BY invested_at DESC");

        let investments = builder
            .build_query_as::<Investment>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(investments)
    }
}
