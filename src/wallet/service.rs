//! Wallet service layer - the ledger primitives
//!
//! Every primitive runs as one database transaction: the wallet row is locked
//! with `FOR UPDATE`, mutated, and exactly one ledger entry is appended whose
//! `balance_after` comes from the freshly written row. Concurrent mutations on
//! the same wallet therefore serialize and can never snapshot a stale balance.
//!
//! The `*_tx` variants operate inside a caller-supplied transaction so the
//! allotment and settlement orchestrators can compose several primitives into
//! a single commit-or-abort unit.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::wallet::{EntryCategory, EntryType, LedgerEntry, Wallet};

/// Wallet service for balance mutations and ledger history
#[derive(Clone)]
pub struct WalletService {
    db_pool: PgPool,
}

impl WalletService {
    /// Create a new wallet service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get a wallet, creating an empty one on first touch
    pub async fn get_wallet(&self, user_id: Uuid) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::lock_wallet(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Ledger history for a user, newest first
    pub async fn entries(&self, user_id: Uuid, limit: Option<i64>) -> ApiResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.unwrap_or(200).clamp(1, 1000))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }

    /// Add spendable funds (external top-up)
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        category: EntryCategory,
        description: &str,
    ) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::credit_tx(&mut tx, user_id, amount, category, description).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Remove spendable funds (withdrawal or repayment)
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        category: EntryCategory,
        description: &str,
    ) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::debit_tx(&mut tx, user_id, amount, category, description).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Earmark spendable funds for a pending commitment
    pub async fn move_to_escrow(&self, user_id: Uuid, amount: i64) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::move_to_escrow_tx(
            &mut tx,
            user_id,
            amount,
            &format!("Moved {amount} to escrow"),
        )
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Return earmarked funds to the spendable balance
    pub async fn release_escrow(&self, user_id: Uuid, amount: i64) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::release_escrow_tx(
            &mut tx,
            user_id,
            amount,
            &format!("Released {amount} from escrow"),
        )
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Convert escrowed funds into an active investment
    pub async fn invest(&self, user_id: Uuid, amount: i64, trip_id: Uuid) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::invest_tx(
            &mut tx,
            user_id,
            amount,
            &format!("Invested {amount} in trip {trip_id}"),
        )
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Pay back an investment: principal plus returns land in the balance
    pub async fn return_investment(
        &self,
        user_id: Uuid,
        principal: i64,
        returns: i64,
    ) -> ApiResult<Wallet> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = Self::return_investment_tx(
            &mut tx,
            user_id,
            principal,
            returns,
            &format!("Investment returned: {principal} principal + {returns} returns"),
        )
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    // ===== Transaction-scoped primitives =====

    /// Lock the wallet row for the remainder of the transaction, creating it
    /// first if the user was never seen before.
    pub(crate) async fn lock_wallet(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> ApiResult<Wallet> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        let wallet =
            sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

        Ok(wallet)
    }

    pub(crate) async fn credit_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        category: EntryCategory,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(amount)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        let wallet = Self::store(tx, &wallet, wallet.balance + amount, None, None, None).await?;
        Self::append_entry(tx, &wallet, EntryType::Credit, amount, category, description).await?;

        Ok(wallet)
    }

    pub(crate) async fn debit_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        category: EntryCategory,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(amount)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.balance < amount {
            return Err(ApiError::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        let wallet = Self::store(tx, &wallet, wallet.balance - amount, None, None, None).await?;
        Self::append_entry(tx, &wallet, EntryType::Debit, amount, category, description).await?;

        Ok(wallet)
    }

    pub(crate) async fn move_to_escrow_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(amount)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.balance < amount {
            return Err(ApiError::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        let wallet = Self::store(
            tx,
            &wallet,
            wallet.balance - amount,
            Some(wallet.escrowed_amount + amount),
            None,
            None,
        )
        .await?;
        Self::append_entry(
            tx,
            &wallet,
            EntryType::Debit,
            amount,
            EntryCategory::Escrow,
            description,
        )
        .await?;

        Ok(wallet)
    }

    pub(crate) async fn release_escrow_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(amount)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.escrowed_amount < amount {
            return Err(ApiError::InsufficientFunds {
                required: amount,
                available: wallet.escrowed_amount,
            });
        }

        let wallet = Self::store(
            tx,
            &wallet,
            wallet.balance + amount,
            Some(wallet.escrowed_amount - amount),
            None,
            None,
        )
        .await?;
        Self::append_entry(
            tx,
            &wallet,
            EntryType::Credit,
            amount,
            EntryCategory::Escrow,
            description,
        )
        .await?;

        Ok(wallet)
    }

    /// Escrow -> total_invested. The spendable balance does not move, so the
    /// ledger entry's `balance_after` equals the previous entry's.
    pub(crate) async fn invest_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(amount)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.escrowed_amount < amount {
            return Err(ApiError::InvalidState(format!(
                "escrowed amount {} is less than {}",
                wallet.escrowed_amount, amount
            )));
        }

        let wallet = Self::store(
            tx,
            &wallet,
            wallet.balance,
            Some(wallet.escrowed_amount - amount),
            Some(wallet.total_invested + amount),
            None,
        )
        .await?;
        Self::append_entry(
            tx,
            &wallet,
            EntryType::Debit,
            amount,
            EntryCategory::Investment,
            description,
        )
        .await?;

        Ok(wallet)
    }

    pub(crate) async fn return_investment_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        principal: i64,
        returns: i64,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(principal)?;
        if returns < 0 {
            return Err(ApiError::InvalidAmount(
                "returns must not be negative".to_string(),
            ));
        }
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.total_invested < principal {
            return Err(ApiError::InvalidState(format!(
                "total invested {} is less than principal {}",
                wallet.total_invested, principal
            )));
        }

        let wallet = Self::store(
            tx,
            &wallet,
            wallet.balance + principal + returns,
            None,
            Some(wallet.total_invested - principal),
            Some(wallet.total_returns + returns),
        )
        .await?;
        Self::append_entry(
            tx,
            &wallet,
            EntryType::Credit,
            principal + returns,
            EntryCategory::Return,
            description,
        )
        .await?;

        Ok(wallet)
    }

    /// Write off an invested principal without any cash movement (default).
    pub(crate) async fn write_off_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        principal: i64,
        description: &str,
    ) -> ApiResult<Wallet> {
        validate_amount(principal)?;
        let wallet = Self::lock_wallet(tx, user_id).await?;

        if wallet.total_invested < principal {
            return Err(ApiError::InvalidState(format!(
                "total invested {} is less than principal {}",
                wallet.total_invested, principal
            )));
        }

        let wallet = Self::store(
            tx,
            &wallet,
            wallet.balance,
            None,
            Some(wallet.total_invested - principal),
            None,
        )
        .await?;
        Self::append_entry(
            tx,
            &wallet,
            EntryType::Debit,
            principal,
            EntryCategory::Investment,
            description,
        )
        .await?;

        Ok(wallet)
    }

    // ===== Private helpers =====

    async fn store(
        tx: &mut Transaction<'_, Postgres>,
        current: &Wallet,
        balance: i64,
        escrowed_amount: Option<i64>,
        total_invested: Option<i64>,
        total_returns: Option<i64>,
    ) -> ApiResult<Wallet> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = $1,
                escrowed_amount = $2,
                total_invested = $3,
                total_returns = $4,
                updated_at = NOW()
            WHERE user_id = $5
            RETURNING *
            "#,
        )
        .bind(balance)
        .bind(escrowed_amount.unwrap_or(current.escrowed_amount))
        .bind(total_invested.unwrap_or(current.total_invested))
        .bind(total_returns.unwrap_or(current.total_returns))
        .bind(current.user_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(wallet)
    }

    /// Append the single ledger entry for a primitive. `balance_after` is
    /// taken from the wallet row written in this same transaction.
    async fn append_entry(
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
        entry_type: EntryType,
        amount: i64,
        category: EntryCategory,
        description: &str,
    ) -> ApiResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries (id, user_id, entry_type, amount, category, description, balance_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wallet.user_id)
        .bind(entry_type)
        .bind(amount)
        .bind(category)
        .bind(description)
        .bind(wallet.balance)
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }
}

fn validate_amount(amount: i64) -> ApiResult<()> {
    if amount <= 0 {
        return Err(ApiError::InvalidAmount(
            "amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
