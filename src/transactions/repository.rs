use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use tracing::info;
use uuid::Uuid;

use super::models::*;
use super::resolver::{ensure_unresolved, Resolution};
use crate::error::{AppError, AppResult};

/// Summary of inbound transactions. Unresolved conflicts count toward the
/// raw totals but are never attributed to a party.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub attributed_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub attributed_expense: Decimal,
    pub unresolved_count: i64,
}

/// Transaction assignment repository
pub struct TransactionRepository {
    pub pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = r#"id, account_id, external_ref, amount, currency,
        counterparty_mobile, direction, client_id, provider_id, project_id,
        counterparty_name, description, needs_resolution, conflict_candidates,
        resolved_at, created_at"#;

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_assignment(
        &self,
        account_id: Uuid,
        external_ref: &str,
        amount: Decimal,
        currency: &str,
        counterparty_mobile: &str,
        direction: Option<EntryDirection>,
        client_id: Option<Uuid>,
        provider_id: Option<Uuid>,
        counterparty_name: Option<&str>,
        needs_resolution: bool,
        conflict_candidates: Option<Vec<ConflictCandidate>>,
    ) -> AppResult<TransactionAssignment> {
        let assignment = sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            INSERT INTO transaction_assignments
                (account_id, external_ref, amount, currency, counterparty_mobile,
                 direction, client_id, provider_id, counterparty_name,
                 needs_resolution, conflict_candidates)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            Self::COLUMNS
        ))
        .bind(account_id)
        .bind(external_ref)
        .bind(amount)
        .bind(currency)
        .bind(counterparty_mobile)
        .bind(direction)
        .bind(client_id)
        .bind(provider_id)
        .bind(counterparty_name)
        .bind(needs_resolution)
        .bind(conflict_candidates.map(Json))
        .fetch_one(&self.pool)
        .await?;

        Ok(assignment)
    }

    pub async fn get_assignment(
        &self,
        account_id: Uuid,
        id: Uuid,
    ) -> AppResult<TransactionAssignment> {
        sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            SELECT {} FROM transaction_assignments
            WHERE id = $1 AND account_id = $2
            "#,
            Self::COLUMNS
        ))
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))
    }

    pub async fn get_by_external_ref(
        &self,
        external_ref: &str,
    ) -> AppResult<Option<TransactionAssignment>> {
        let assignment = sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            SELECT {} FROM transaction_assignments WHERE external_ref = $1
            "#,
            Self::COLUMNS
        ))
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    pub async fn list_assignments(
        &self,
        account_id: Uuid,
    ) -> AppResult<Vec<TransactionAssignment>> {
        let assignments = sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            SELECT {} FROM transaction_assignments
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
            Self::COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    pub async fn list_conflicts(&self, account_id: Uuid) -> AppResult<Vec<TransactionAssignment>> {
        let conflicts = sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            SELECT {} FROM transaction_assignments
            WHERE account_id = $1 AND needs_resolution = TRUE
            ORDER BY created_at
            "#,
            Self::COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conflicts)
    }

    /// Apply a disambiguation choice as a full overwrite of the assignment
    /// fields. Resolution is terminal: a record that already carries
    /// resolved_at is rejected with a Conflict.
    pub async fn resolve_assignment(
        &self,
        account_id: Uuid,
        id: Uuid,
        resolution: &Resolution,
        counterparty_name: &str,
    ) -> AppResult<TransactionAssignment> {
        let existing = self.get_assignment(account_id, id).await?;
        ensure_unresolved(&existing)?;

        let assignment = sqlx::query_as::<_, TransactionAssignment>(&format!(
            r#"
            UPDATE transaction_assignments
            SET client_id = $3, provider_id = $4, direction = $5, description = $6,
                project_id = $7, counterparty_name = $8,
                needs_resolution = FALSE, conflict_candidates = NULL, resolved_at = $9
            WHERE id = $1 AND account_id = $2
            RETURNING {}
            "#,
            Self::COLUMNS
        ))
        .bind(id)
        .bind(account_id)
        .bind(resolution.client_id)
        .bind(resolution.provider_id)
        .bind(resolution.direction)
        .bind(&resolution.description)
        .bind(resolution.project_id)
        .bind(counterparty_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;

        info!(
            "Transaction {} resolved to {}",
            assignment.external_ref, counterparty_name
        );
        Ok(assignment)
    }

    /// Aggregate view: attribution excludes unresolved rows, raw totals keep
    /// them.
    pub async fn summary(&self, account_id: Uuid) -> AppResult<TransactionSummary> {
        let row: (Option<Decimal>, i64, Option<Decimal>, Option<Decimal>, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    SUM(amount),
                    COUNT(*),
                    SUM(amount) FILTER (
                        WHERE needs_resolution = FALSE AND direction = 'revenue'
                              AND (client_id IS NOT NULL OR provider_id IS NOT NULL)
                    ),
                    SUM(amount) FILTER (
                        WHERE needs_resolution = FALSE AND direction = 'expense'
                              AND (client_id IS NOT NULL OR provider_id IS NOT NULL)
                    ),
                    COUNT(*) FILTER (WHERE needs_resolution = TRUE)
                FROM transaction_assignments
                WHERE account_id = $1
                "#,
            )
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(TransactionSummary {
            total_amount: row.0.unwrap_or(Decimal::ZERO),
            total_count: row.1,
            attributed_revenue: row.2.unwrap_or(Decimal::ZERO),
            attributed_expense: row.3.unwrap_or(Decimal::ZERO),
            unresolved_count: row.4,
        })
    }
}
