use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::*;
use crate::error::{AppResult, PaymentError};

/// Payment repository - sessions, payouts and the expense ledger
pub struct PaymentRepository {
    pub pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_tx(&self) -> AppResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ========== SESSION OPERATIONS ==========

    pub async fn insert_session_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        invoice_id: Uuid,
        external_ref: &str,
        launch_url: Option<&str>,
        amount: Decimal,
        currency: &str,
    ) -> AppResult<PaymentSession> {
        let session = sqlx::query_as::<_, PaymentSession>(
            r#"
            INSERT INTO payment_sessions
                (account_id, invoice_id, external_ref, launch_url, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'created')
            RETURNING id, account_id, invoice_id, external_ref, launch_url, amount,
                      currency, status, created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(invoice_id)
        .bind(external_ref)
        .bind(launch_url)
        .bind(amount)
        .bind(currency)
        .fetch_one(&mut **tx)
        .await?;

        Ok(session)
    }

    /// Expire every other still-open session attached to the invoice; the
    /// replacement becomes the only live link.
    pub async fn expire_superseded_sessions_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        keep_external_ref: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_sessions
            SET status = 'expired', updated_at = NOW()
            WHERE invoice_id = $1 AND external_ref <> $2 AND status = 'created'
            "#,
        )
        .bind(invoice_id)
        .bind(keep_external_ref)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn get_session_by_external_ref(
        &self,
        external_ref: &str,
    ) -> AppResult<Option<PaymentSession>> {
        let session = sqlx::query_as::<_, PaymentSession>(
            r#"
            SELECT id, account_id, invoice_id, external_ref, launch_url, amount,
                   currency, status, created_at, updated_at
            FROM payment_sessions
            WHERE external_ref = $1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_session_for_invoice(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
        external_ref: &str,
    ) -> AppResult<PaymentSession> {
        sqlx::query_as::<_, PaymentSession>(
            r#"
            SELECT id, account_id, invoice_id, external_ref, launch_url, amount,
                   currency, status, created_at, updated_at
            FROM payment_sessions
            WHERE account_id = $1 AND invoice_id = $2 AND external_ref = $3
            "#,
        )
        .bind(account_id)
        .bind(invoice_id)
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PaymentError::SessionNotFound(external_ref.to_string()).into())
    }

    pub async fn set_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_sessions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_session_status_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: SessionStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_sessions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ========== PAYOUT OPERATIONS ==========

    pub async fn insert_payout(
        &self,
        account_id: Uuid,
        provider_id: Uuid,
        external_ref: &str,
        amount: Decimal,
        currency: &str,
        status: PayoutStatus,
    ) -> AppResult<Payout> {
        let payout = sqlx::query_as::<_, Payout>(
            r#"
            INSERT INTO payouts
                (account_id, provider_id, external_ref, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, account_id, provider_id, external_ref, amount, currency,
                      status, expense_id, created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(provider_id)
        .bind(external_ref)
        .bind(amount)
        .bind(currency)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(payout)
    }

    pub async fn get_payout(&self, account_id: Uuid, id: Uuid) -> AppResult<Payout> {
        sqlx::query_as::<_, Payout>(
            r#"
            SELECT id, account_id, provider_id, external_ref, amount, currency,
                   status, expense_id, created_at, updated_at
            FROM payouts
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PaymentError::PayoutNotFound(id).into())
    }

    pub async fn get_payout_by_external_ref(
        &self,
        external_ref: &str,
    ) -> AppResult<Option<Payout>> {
        let payout = sqlx::query_as::<_, Payout>(
            r#"
            SELECT id, account_id, provider_id, external_ref, amount, currency,
                   status, expense_id, created_at, updated_at
            FROM payouts
            WHERE external_ref = $1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payout)
    }

    /// Guarded payout status move inside a transaction. Zero rows affected
    /// means the payout left the expected state concurrently.
    pub async fn set_payout_status_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::InvalidTransition {
                entity: "payout",
                current: "unknown".to_string(),
                requested: to.to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub async fn link_payout_expense_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payout_id: Uuid,
        expense_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payouts
            SET expense_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payout_id)
        .bind(expense_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ========== EXPENSE OPERATIONS ==========

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_expense_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        provider_id: Option<Uuid>,
        project_id: Option<Uuid>,
        description: &str,
        amount: Decimal,
        source: ExpenseSource,
        payout_id: Option<Uuid>,
        incurred_at: DateTime<Utc>,
    ) -> AppResult<Expense> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses
                (account_id, provider_id, project_id, description, amount, source,
                 payout_id, incurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, account_id, provider_id, project_id, description, amount,
                      source, payout_id, incurred_at
            "#,
        )
        .bind(account_id)
        .bind(provider_id)
        .bind(project_id)
        .bind(description)
        .bind(amount)
        .bind(source)
        .bind(payout_id)
        .bind(incurred_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(expense)
    }

    pub async fn expenses_for_payout(&self, payout_id: Uuid) -> AppResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, account_id, provider_id, project_id, description, amount,
                   source, payout_id, incurred_at
            FROM expenses
            WHERE payout_id = $1
            ORDER BY incurred_at
            "#,
        )
        .bind(payout_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    pub async fn list_expenses(&self, account_id: Uuid) -> AppResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, account_id, provider_id, project_id, description, amount,
                   source, payout_id, incurred_at
            FROM expenses
            WHERE account_id = $1
            ORDER BY incurred_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }
}
